//! Special commands.  These receive the processor and the raw arguments.

use crate::action::processor::Processor;
use crate::action::transaction::Argument;
use crate::error::EngineError;
use crate::value::Value;
use log::debug;

/// Resolve `arg` and require a non-negative integer.
fn count(p: &Processor<'_>, arg: &Argument, name: &str) -> Result<usize, EngineError> {
    let n = p.resolve(arg)?.as_int()?;
    usize::try_from(n)
        .map_err(|_| EngineError::invalid(format!("{}: count {} is negative", name, n)))
}

/// `push([n], values...)`
///
/// Without arguments a single `Nil` is pushed.  With only a count, that many
/// `Nil`s.  With values, there must be exactly `n` of them.
pub fn push(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    let Some((first, values)) = args.split_first() else {
        p.stack_mut().push(1)?;
        return Ok(());
    };
    let n = count(p, first, "push")?;
    if values.is_empty() {
        p.stack_mut().push(n)?;
        return Ok(());
    }
    if values.len() != n {
        return Err(EngineError::invalid(format!(
            "push: count {} but {} values",
            n,
            values.len()
        )));
    }
    let values = p.resolve_all(values)?;
    p.stack_mut().push_values(values)
}

/// `pop([n])`, one slot by default.
pub fn pop(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    let n = match args {
        [] => 1,
        [arg] => count(p, arg, "pop")?,
        _ => return Err(EngineError::invalid("pop: takes at most one argument")),
    };
    p.stack_mut().pop(n)
}

/// `store(src, dst)`: overwrite the slot at `dst` with the value of `src`.
pub fn store(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    let [src, dst] = args else {
        return Err(EngineError::invalid(format!(
            "store: takes 2 arguments, got {}",
            args.len()
        )));
    };
    let Argument::Indirect(pos) = dst else {
        return Err(EngineError::invalid(
            "store: destination must be a stack position",
        ));
    };
    let value = p.resolve(src)?;
    let index = p.resolve_index(*pos)?;
    *p.stack_mut().value_at_mut(index as i64)? = value;
    Ok(())
}

/// Jump `delta` statements ahead, halting if that leaves the list.
fn jump_by(p: &mut Processor<'_>, delta: i64) -> Result<(), EngineError> {
    let spill = p.jump(delta)?;
    if spill > 0 {
        debug!("jump of {} leaves the transaction by {}", delta, spill);
        p.jump_out(spill);
    }
    Ok(())
}

/// `jump(delta)`
pub fn jump(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    let [arg] = args else {
        return Err(EngineError::invalid(format!(
            "jump: takes 1 argument, got {}",
            args.len()
        )));
    };
    let delta = p.resolve(arg)?.as_int()?;
    jump_by(p, delta)
}

/// `jump_if(cond, delta)`
pub fn jump_if(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    let [cond, delta] = args else {
        return Err(EngineError::invalid(format!(
            "jump_if: takes 2 arguments, got {}",
            args.len()
        )));
    };
    let delta = p.resolve(delta)?.as_int()?;
    if p.resolve(cond)?.truthy()? {
        jump_by(p, delta)?;
    }
    Ok(())
}

/// `context()`: push the object the transaction runs for, or `Nil`.
pub fn context(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    if !args.is_empty() {
        return Err(EngineError::invalid("context: takes no arguments"));
    }
    let value = p.context().cloned().map(Value::object).unwrap_or_default();
    p.stack_mut().push_values(vec![value])
}

/// `exit()`
pub fn exit(p: &mut Processor<'_>, args: &[Argument]) -> Result<(), EngineError> {
    if !args.is_empty() {
        return Err(EngineError::invalid("exit: takes no arguments"));
    }
    debug!("exit requested");
    p.request_exit();
    Ok(())
}
