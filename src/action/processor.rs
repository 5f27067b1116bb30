//! Runs one transaction's statements against the execution stack.
//!
//! A [`Processor`] starts a new stack frame when it is created and restores
//! the previous one when it is dropped, whatever way execution ended.  The
//! stack is therefore unchanged after every transaction, successful or not.
//!
//! # States
//!
//! ```text
//! Ready ──run()──▶ Running ──▶ HaltedOk
//!                         ├──▶ HaltedError
//!                         └──▶ HaltedJumpOut(spill)
//! ```

use crate::action::stack::ExecutionStack;
use crate::action::transaction::{Argument, Statement};
use crate::command::{Handler, RegularFn};
use crate::error::EngineError;
use crate::objects::ObjectRef;
use crate::value::Value;
use log::{trace, warn};

/// Lifecycle state of a [`Processor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Ready,
    Running,
    HaltedOk,
    HaltedError,
    /// A jump targeted a statement `spill` positions past the end.
    HaltedJumpOut(usize),
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// The last statement completed.  Carries the top of the frame.
    Ok(Option<Value>),
    /// A jump left the statement list.
    JumpOut { spill: usize, value: Option<Value> },
}

impl Halt {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Halt::Ok(value) | Halt::JumpOut { value, .. } => value,
        }
    }
}

/// A command failed and halted the processor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{command} (statement {pc}): {source}")]
pub struct ExecError {
    pub command: &'static str,
    pub pc: usize,
    pub source: EngineError,
}

/// Executes a statement list on a stack frame of its own.
pub struct Processor<'a> {
    stack: &'a mut ExecutionStack,
    statements: &'a [Statement],
    context: Option<ObjectRef>,
    saved_frame: usize,
    pc: usize,
    jumped: bool,
    spill: usize,
    exit_requested: bool,
    state: ProcessorState,
}

impl<'a> Processor<'a> {
    /// Prepare to run `statements`, starting a new frame on `stack`.
    pub fn new(
        stack: &'a mut ExecutionStack,
        statements: &'a [Statement],
        context: Option<ObjectRef>,
    ) -> Self {
        let saved_frame = stack.start_frame();
        Self {
            stack,
            statements,
            context,
            saved_frame,
            pc: 0,
            jumped: false,
            spill: 0,
            exit_requested: false,
            state: ProcessorState::Ready,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Index of the statement being executed.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stack(&self) -> &ExecutionStack {
        &*self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ExecutionStack {
        &mut *self.stack
    }

    /// The object the transaction runs on behalf of, if any.
    pub fn context(&self) -> Option<&ObjectRef> {
        self.context.as_ref()
    }

    /// Ask the embedding loop to shut down once this transaction ends.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Resolve a stack position to an absolute index inside this frame.
    pub fn resolve_index(&self, pos: i64) -> Result<usize, EngineError> {
        let index = self.stack.index_of(pos)?;
        if index < self.stack.frame() {
            return Err(EngineError::invalid(format!(
                "position {} is below the current frame",
                pos
            )));
        }
        Ok(index)
    }

    /// The value an argument stands for.
    pub fn resolve(&self, arg: &Argument) -> Result<Value, EngineError> {
        match arg {
            Argument::Direct(value) => Ok(value.clone()),
            Argument::Indirect(pos) => {
                let index = self.resolve_index(*pos)?;
                self.stack.value_at(index as i64).cloned()
            }
        }
    }

    pub fn resolve_all(&self, args: &[Argument]) -> Result<Vec<Value>, EngineError> {
        args.iter().map(|arg| self.resolve(arg)).collect()
    }

    /// Jump `delta` statements forward from the current one.
    ///
    /// Returns `0` when the target is inside the statement list; otherwise
    /// the jump is not taken and the return value is how far past the end
    /// the target lies (`1` for the position right after the last
    /// statement).
    pub fn jump(&mut self, delta: i64) -> Result<usize, EngineError> {
        let delta = usize::try_from(delta)
            .map_err(|_| EngineError::invalid(format!("jump of {} is backwards", delta)))?;
        let len = self.statements.len();
        let target = self.pc.saturating_add(delta);
        if target < len {
            self.pc = target;
            self.jumped = true;
            Ok(0)
        } else {
            Ok(target - len + 1)
        }
    }

    /// Halt after the current statement, `spill` statements past the end.
    pub fn jump_out(&mut self, spill: usize) {
        self.spill = spill;
    }

    /// Top of the current frame.
    fn result(&self) -> Option<Value> {
        if self.stack.frame_len() > 0 {
            self.stack.peek().cloned()
        } else {
            None
        }
    }

    /// Execute statements until the list ends, a command fails or a jump
    /// leaves the list.
    pub fn run(&mut self) -> Result<Halt, ExecError> {
        self.state = ProcessorState::Running;
        let statements = self.statements;
        while let Some(stmt) = statements.get(self.pc) {
            trace!("pc {}: {}", self.pc, stmt.command.name);
            self.jumped = false;
            if let Err(source) = self.step(stmt) {
                self.state = ProcessorState::HaltedError;
                return Err(ExecError {
                    command: stmt.command.name,
                    pc: self.pc,
                    source,
                });
            }
            if self.spill > 0 {
                self.state = ProcessorState::HaltedJumpOut(self.spill);
                return Ok(Halt::JumpOut {
                    spill: self.spill,
                    value: self.result(),
                });
            }
            if !self.jumped {
                self.pc += 1;
            }
        }
        self.state = ProcessorState::HaltedOk;
        Ok(Halt::Ok(self.result()))
    }

    fn step(&mut self, stmt: &Statement) -> Result<(), EngineError> {
        match stmt.command.handler {
            Handler::Regular(f) => self.dispatch_regular(f, &stmt.args),
            Handler::Special(f) => f(self, &stmt.args),
        }
    }

    /// Run a regular command.
    ///
    /// With arguments, their values are pushed as a fresh run; without, the
    /// command operates on the whole current frame.  Slots the command does
    /// not keep are popped.
    fn dispatch_regular(&mut self, f: RegularFn, args: &[Argument]) -> Result<(), EngineError> {
        let start = if args.is_empty() {
            self.stack.frame()
        } else {
            let values = self.resolve_all(args)?;
            let start = self.stack.top();
            self.stack.push_values(values)?;
            start
        };
        let run = self.stack.slots_from_mut(start)?;
        let len = run.len();
        let kept = f(run)?.min(len);
        self.stack.pop(len - kept)
    }
}

impl Drop for Processor<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.stack.restore_frame(self.saved_frame) {
            warn!("failed to restore stack frame {}: {}", self.saved_frame, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::transaction::Argument::{Direct, Indirect};
    use crate::command::table::lookup;
    use crate::objects::connection::Connection;

    fn stmt(name: &str, args: Vec<Argument>) -> Statement {
        Statement::new(lookup(name).unwrap(), args)
    }

    fn int(i: i64) -> Argument {
        Direct(Value::Int(i))
    }

    fn run(stack: &mut ExecutionStack, statements: &[Statement]) -> Result<Halt, ExecError> {
        Processor::new(stack, statements, None).run()
    }

    #[test]
    fn push_push_add_leaves_sum() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(2)]),
            stmt("push", vec![int(1), int(3)]),
            stmt("add", vec![]),
        ];
        let halt = run(&mut stack, &program).unwrap();
        assert_eq!(halt, Halt::Ok(Some(Value::Int(5))));
        assert_eq!(stack.top(), 0, "frame must be restored");
    }

    #[test]
    fn store_into_literal_is_invalid() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(2)]),
            stmt("push", vec![int(1), int(3)]),
            stmt("add", vec![]),
            stmt("store", vec![Indirect(-1), int(0)]),
        ];
        let err = run(&mut stack, &program).unwrap_err();
        assert_eq!(err.command, "store");
        assert_eq!(err.pc, 3);
        assert!(matches!(err.source, EngineError::InvalidArgument(_)));
        assert_eq!(stack.top(), 0);
    }

    #[test]
    fn frame_is_restored_after_failure() {
        let mut stack = ExecutionStack::new(4);
        stack.push_values(vec![Value::Int(7)]).unwrap();
        let program = vec![stmt("push", vec![int(3)]), stmt("div", vec![int(1), int(0)])];
        assert!(run(&mut stack, &program).is_err());
        assert_eq!(stack.top(), 1);
        assert_eq!(stack.frame(), 0);
        assert_eq!(stack.value_at(0).unwrap(), &Value::Int(7));
    }

    #[test]
    fn regular_with_arguments_pushes_a_run() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(10)]),
            stmt("sub", vec![Indirect(0), int(4)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        assert_eq!(p.state(), ProcessorState::Ready);
        let halt = p.run().unwrap();
        assert_eq!(p.state(), ProcessorState::HaltedOk);
        assert_eq!(p.stack().frame_len(), 2);
        assert_eq!(halt.into_value(), Some(Value::Int(6)));
    }

    #[test]
    fn store_copies_between_positions() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(2), int(1), int(2)]),
            stmt("store", vec![Direct(Value::from("x")), Indirect(0)]),
            stmt("store", vec![Indirect(0), Indirect(-1)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        p.run().unwrap();
        assert_eq!(p.stack().value_at(0).unwrap(), &Value::from("x"));
        assert_eq!(p.stack().value_at(1).unwrap(), &Value::from("x"));
    }

    #[test]
    fn push_arity_mismatch_is_invalid() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![stmt("push", vec![int(2), int(1)])];
        let err = run(&mut stack, &program).unwrap_err();
        assert!(matches!(err.source, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn push_and_pop_defaults() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![]),
            stmt("push", vec![int(3)]),
            stmt("pop", vec![]),
            stmt("pop", vec![int(2)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        assert_eq!(p.run().unwrap(), Halt::Ok(Some(Value::Nil)));
        assert_eq!(p.stack().frame_len(), 1);
    }

    #[test]
    fn pop_below_frame_fails() {
        let mut stack = ExecutionStack::new(4);
        stack.push(3).unwrap();
        let program = vec![stmt("push", vec![]), stmt("pop", vec![int(2)])];
        assert!(run(&mut stack, &program).is_err());
        assert_eq!(stack.top(), 3);
    }

    #[test]
    fn indirect_below_frame_is_rejected() {
        let mut stack = ExecutionStack::new(4);
        stack.push_values(vec![Value::Int(1)]).unwrap();
        let program = vec![stmt("add", vec![Indirect(0), int(1)])];
        let err = run(&mut stack, &program).unwrap_err();
        assert!(matches!(err.source, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn jump_within_list_skips_statements() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(1)]),
            stmt("jump", vec![int(2)]),
            stmt("push", vec![int(1), int(99)]),
            stmt("push", vec![int(1), int(2)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        let halt = p.run().unwrap();
        assert_eq!(halt, Halt::Ok(Some(Value::Int(2))));
        assert_eq!(p.stack().frame_len(), 2);
    }

    #[test]
    fn jump_past_the_end_spills() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(1)]),
            stmt("jump", vec![int(3)]),
            stmt("push", vec![int(1), int(99)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        let halt = p.run().unwrap();
        // pc 1 + 3 = 4, list length 3: two past the end.
        assert_eq!(
            halt,
            Halt::JumpOut {
                spill: 2,
                value: Some(Value::Int(1))
            }
        );
        assert_eq!(p.state(), ProcessorState::HaltedJumpOut(2));
        assert_eq!(p.pc(), 1, "pc must not move on a spill");
    }

    #[test]
    fn jump_return_values() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![stmt("push", vec![]), stmt("push", vec![]), stmt("push", vec![])];
        let mut p = Processor::new(&mut stack, &program, None);
        assert_eq!(p.jump(2).unwrap(), 0);
        assert_eq!(p.pc(), 2);
        assert_eq!(p.jump(1).unwrap(), 1);
        assert_eq!(p.jump(5).unwrap(), 5);
        assert_eq!(p.pc(), 2);
        assert!(p.jump(-1).is_err());
    }

    #[test]
    fn jump_argument_checks() {
        let mut stack = ExecutionStack::new(4);
        for args in [vec![], vec![int(1), int(1)], vec![Direct(Value::from("x"))]] {
            let program = vec![stmt("jump", args)];
            let err = run(&mut stack, &program).unwrap_err();
            assert!(matches!(err.source, EngineError::InvalidArgument(_)));
        }
    }

    #[test]
    fn jump_through_indirect_count() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(2)]),
            stmt("jump", vec![Indirect(-1)]),
            stmt("push", vec![int(1), int(99)]),
            stmt("push", vec![int(1), int(7)]),
        ];
        let halt = run(&mut stack, &program).unwrap();
        assert_eq!(halt.into_value(), Some(Value::Int(7)));
    }

    #[test]
    fn jump_if_branches_on_condition() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("jump_if", vec![Direct(Value::Bool(false)), int(2)]),
            stmt("push", vec![int(1), int(1)]),
            stmt("jump_if", vec![Direct(Value::Bool(true)), int(2)]),
            stmt("push", vec![int(1), int(99)]),
            stmt("push", vec![int(1), int(2)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        p.run().unwrap();
        assert_eq!(p.stack().frame_len(), 2);
        assert_eq!(p.stack().value_at(-1).unwrap(), &Value::Int(2));
        assert_eq!(p.stack().value_at(-2).unwrap(), &Value::Int(1));
    }

    #[test]
    fn context_and_exit() {
        let mut stack = ExecutionStack::new(4);
        let ctx = ObjectRef::new(Connection::new(4));
        let program = vec![stmt("context", vec![]), stmt("exit", vec![])];
        let mut p = Processor::new(&mut stack, &program, Some(ctx.clone()));
        let halt = p.run().unwrap();
        assert!(p.exit_requested());
        assert_eq!(halt.into_value(), Some(Value::object(ctx)));
    }

    #[test]
    fn context_and_exit_take_no_arguments() {
        let mut stack = ExecutionStack::new(4);
        for name in ["context", "exit"] {
            let program = vec![stmt(name, vec![int(1)])];
            let mut p = Processor::new(&mut stack, &program, None);
            let err = p.run().unwrap_err();
            assert_eq!(err.command, name);
            assert!(matches!(err.source, EngineError::InvalidArgument(_)));
            assert!(!p.exit_requested());
        }
    }

    #[test]
    fn context_is_nil_without_one() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![stmt("context", vec![])];
        assert_eq!(run(&mut stack, &program).unwrap(), Halt::Ok(Some(Value::Nil)));
    }

    #[test]
    fn empty_transaction_has_no_value() {
        let mut stack = ExecutionStack::new(4);
        assert_eq!(run(&mut stack, &[]).unwrap(), Halt::Ok(None));
    }

    #[test]
    fn log_consumes_its_run() {
        let mut stack = ExecutionStack::new(4);
        let program = vec![
            stmt("push", vec![int(1), int(5)]),
            stmt("log", vec![Direct(Value::from("test")), int(4), Indirect(0)]),
        ];
        let mut p = Processor::new(&mut stack, &program, None);
        p.run().unwrap();
        assert_eq!(p.stack().frame_len(), 1);
    }

    #[test]
    fn nested_processors_keep_outer_values() {
        let mut stack = ExecutionStack::new(4);
        let outer = vec![stmt("push", vec![int(1), int(1)])];
        let inner = vec![stmt("push", vec![int(3)]), stmt("pop", vec![int(3)])];
        let mut p = Processor::new(&mut stack, &outer, None);
        p.run().unwrap();
        {
            let mut q = Processor::new(p.stack_mut(), &inner, None);
            q.run().unwrap();
        }
        assert_eq!(p.stack().frame_len(), 1);
        assert_eq!(p.stack().value_at(0).unwrap(), &Value::Int(1));
    }
}
