//! Regular commands.
//!
//! Each handler receives the run of values it operates on, rewrites it in
//! place and returns how many leading slots hold its result.  Most commands
//! collapse the run into a single value in the first slot.

use crate::error::EngineError;
use crate::value::Value;
use log::{debug, log, warn, Level};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::os::unix::process::CommandExt;

/// Fail unless the run holds at least `min` values.
fn require_at_least(run: &[Value], min: usize, name: &str) -> Result<(), EngineError> {
    if run.len() < min {
        return Err(EngineError::invalid(format!(
            "{} needs at least {} argument(s), got {}",
            name,
            min,
            run.len()
        )));
    }
    Ok(())
}

fn require_exactly(run: &[Value], n: usize, name: &str) -> Result<(), EngineError> {
    if run.len() != n {
        return Err(EngineError::invalid(format!(
            "{} takes {} argument(s), got {}",
            name,
            n,
            run.len()
        )));
    }
    Ok(())
}

/// Fold the run as integers with `op` and collapse it into the result.
fn fold_ints(
    run: &mut [Value],
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<usize, EngineError> {
    require_at_least(run, 1, name)?;
    let mut acc = run[0].as_int()?;
    for value in &run[1..] {
        let rhs = value.as_int()?;
        acc = op(acc, rhs).ok_or_else(|| {
            EngineError::invalid(format!("{}: {} and {} overflow or divide by zero", name, acc, rhs))
        })?;
    }
    run[0] = Value::Int(acc);
    Ok(1)
}

fn fold_bools(run: &mut [Value], name: &str, op: fn(bool, bool) -> bool) -> Result<usize, EngineError> {
    require_at_least(run, 1, name)?;
    let mut acc = run[0].as_bool()?;
    for value in &run[1..] {
        acc = op(acc, value.as_bool()?);
    }
    run[0] = Value::Bool(acc);
    Ok(1)
}

/// Collapse the run into whether every adjacent pair satisfies `pred`.
fn chain(run: &mut [Value], name: &str, pred: fn(&Value, &Value) -> bool) -> Result<usize, EngineError> {
    require_at_least(run, 1, name)?;
    let holds = run.windows(2).all(|w| pred(&w[0], &w[1]));
    run[0] = Value::Bool(holds);
    Ok(1)
}

pub fn add(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_ints(run, "add", i64::checked_add)
}

pub fn sub(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_ints(run, "sub", i64::checked_sub)
}

pub fn mul(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_ints(run, "mul", i64::checked_mul)
}

pub fn div(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_ints(run, "div", i64::checked_div)
}

pub fn modulo(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_ints(run, "mod", i64::checked_rem)
}

pub fn and(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_bools(run, "and", |a, b| a && b)
}

pub fn or(run: &mut [Value]) -> Result<usize, EngineError> {
    fold_bools(run, "or", |a, b| a || b)
}

pub fn not(run: &mut [Value]) -> Result<usize, EngineError> {
    require_exactly(run, 1, "not")?;
    run[0] = Value::Bool(!run[0].as_bool()?);
    Ok(1)
}

pub fn eq(run: &mut [Value]) -> Result<usize, EngineError> {
    chain(run, "eq", |a, b| a == b)
}

/// Orderings only make sense between values of one kind.
fn require_one_kind(run: &[Value], name: &str) -> Result<(), EngineError> {
    if let Some(w) = run.windows(2).find(|w| w[0].kind() != w[1].kind()) {
        return Err(EngineError::invalid(format!(
            "{}: cannot order {} against {}",
            name,
            w[0].kind(),
            w[1].kind()
        )));
    }
    Ok(())
}

pub fn lt(run: &mut [Value]) -> Result<usize, EngineError> {
    require_one_kind(run, "lt")?;
    chain(run, "lt", |a, b| a < b)
}

pub fn gt(run: &mut [Value]) -> Result<usize, EngineError> {
    require_one_kind(run, "gt")?;
    chain(run, "gt", |a, b| a > b)
}

/// Concatenate the display form of every value into one string.
pub fn concat(run: &mut [Value]) -> Result<usize, EngineError> {
    require_at_least(run, 1, "concat")?;
    let joined: String = run.iter().map(|v| v.to_string()).collect();
    run[0] = Value::String(joined);
    Ok(1)
}

/// Collapse the run into a set of its values.
pub fn set(run: &mut [Value]) -> Result<usize, EngineError> {
    require_at_least(run, 1, "set")?;
    let items: Vec<Value> = run.iter_mut().map(std::mem::take).collect();
    run[0] = Value::set(items);
    Ok(1)
}

/// `named(name, value)`: attach a name to a value.
pub fn named(run: &mut [Value]) -> Result<usize, EngineError> {
    require_exactly(run, 2, "named")?;
    let name = run[0].as_str()?.to_owned();
    let value = std::mem::take(&mut run[1]);
    run[0] = Value::named(name, value);
    Ok(1)
}

/// Hash one value.  Objects must provide the hash capability.
pub fn hash(run: &mut [Value]) -> Result<usize, EngineError> {
    require_exactly(run, 1, "hash")?;
    let h = match &run[0] {
        Value::Object(Some(obj)) | Value::Set(obj) => obj.hash_value()?,
        other => {
            let mut hasher = DefaultHasher::new();
            other.hash(&mut hasher);
            hasher.finish()
        }
    };
    run[0] = Value::Int(h as i64);
    Ok(1)
}

/// `call(object, args...)`: invoke the object's run capability on `args`.
///
/// The object's results replace the whole run.
pub fn call(run: &mut [Value]) -> Result<usize, EngineError> {
    require_at_least(run, 1, "call")?;
    let obj = run[0].as_object()?.clone();
    let kept = obj.run(&mut run[1..])?.min(run.len() - 1);
    run.rotate_left(1);
    Ok(kept)
}

fn log_level(level: i64) -> Result<Level, EngineError> {
    match level {
        1 => Ok(Level::Error),
        2 => Ok(Level::Warn),
        3 => Ok(Level::Info),
        4 => Ok(Level::Debug),
        5 => Ok(Level::Trace),
        other => Err(EngineError::invalid(format!("log level {} not in 1..=5", other))),
    }
}

/// `log(context, level, message...)`: write a plugin log line.
pub fn log(run: &mut [Value]) -> Result<usize, EngineError> {
    require_at_least(run, 2, "log")?;
    let level = log_level(run[1].as_int()?)?;
    let message = run[2..]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    log!(target: "waysome::plugin", level, "[{}] {}", run[0], message);
    Ok(0)
}

/// `exec(path, args...)`: spawn a process as the real user and group.
///
/// Collapses into the child's pid.  The child is reaped on a helper thread.
pub fn exec(run: &mut [Value]) -> Result<usize, EngineError> {
    require_at_least(run, 1, "exec")?;
    let path = run[0].as_str()?.to_owned();
    let args: Vec<String> = run[1..].iter().map(|v| v.to_string()).collect();

    // SAFETY: getuid and getgid have no preconditions and cannot fail.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

    let mut child = std::process::Command::new(&path)
        .args(&args)
        .uid(uid)
        .gid(gid)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::not_found(format!("exec {}: {}", path, e)),
            _ => EngineError::invalid(format!("exec {}: {}", path, e)),
        })?;
    let pid = child.id();
    debug!("spawned {} as pid {}", path, pid);

    std::thread::spawn(move || match child.wait() {
        Ok(status) => debug!("pid {} exited: {}", pid, status),
        Err(e) => warn!("waiting for pid {}: {}", pid, e),
    });

    run[0] = Value::Int(i64::from(pid));
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::connection::Connection;
    use crate::objects::object::tests::Probe;
    use crate::objects::ObjectRef;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn add_collapses_the_run() {
        let mut run = ints(&[2, 3]);
        assert_eq!(add(&mut run).unwrap(), 1);
        assert_eq!(run[0], Value::Int(5));
    }

    #[test]
    fn arithmetic_folds_left() {
        let mut run = ints(&[20, 3, 2]);
        sub(&mut run).unwrap();
        assert_eq!(run[0], Value::Int(15));

        let mut run = ints(&[20, 3]);
        div(&mut run).unwrap();
        assert_eq!(run[0], Value::Int(6));

        let mut run = ints(&[20, 3]);
        modulo(&mut run).unwrap();
        assert_eq!(run[0], Value::Int(2));

        let mut run = ints(&[2, 3, 4]);
        mul(&mut run).unwrap();
        assert_eq!(run[0], Value::Int(24));
    }

    #[test]
    fn division_by_zero_and_overflow_fail() {
        let mut run = ints(&[1, 0]);
        assert!(matches!(div(&mut run), Err(EngineError::InvalidArgument(_))));
        let mut run = ints(&[i64::MAX, 1]);
        assert!(matches!(add(&mut run), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn arithmetic_rejects_non_ints_and_empty_runs() {
        let mut run = vec![Value::Int(1), Value::from("2")];
        assert!(add(&mut run).is_err());
        assert!(add(&mut []).is_err());
    }

    #[test]
    fn boolean_logic() {
        let mut run = vec![Value::Bool(true), Value::Bool(false)];
        and(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(false));

        let mut run = vec![Value::Bool(false), Value::Bool(true)];
        or(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(true));

        let mut run = vec![Value::Bool(false)];
        not(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(true));

        assert!(not(&mut vec![Value::Bool(true), Value::Bool(true)]).is_err());
    }

    #[test]
    fn comparisons_chain() {
        let mut run = ints(&[1, 2, 3]);
        lt(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(true));

        let mut run = ints(&[3, 2, 2]);
        gt(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(false));

        let mut run = vec![Value::from("a"), Value::from("a")];
        eq(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(true));
    }

    #[test]
    fn ordering_mixed_kinds_is_invalid() {
        let mut run = vec![Value::Int(1), Value::from("a")];
        assert!(matches!(lt(&mut run), Err(EngineError::InvalidArgument(_))));
        let mut run = vec![Value::from("b"), Value::from("a"), Value::Nil];
        assert!(matches!(gt(&mut run), Err(EngineError::InvalidArgument(_))));

        // Equality across kinds is still answered.
        let mut run = vec![Value::Int(1), Value::from("1")];
        eq(&mut run).unwrap();
        assert_eq!(run[0], Value::Bool(false));
    }

    #[test]
    fn concat_uses_display_form() {
        let mut run = vec![Value::from("ws-"), Value::Int(3)];
        concat(&mut run).unwrap();
        assert_eq!(run[0], Value::from("ws-3"));
    }

    #[test]
    fn set_and_named_build_compound_values() {
        let mut run = ints(&[3, 1, 3]);
        set(&mut run).unwrap();
        assert_eq!(run[0].set_items().unwrap(), ints(&[1, 3]));

        let mut run = vec![Value::from("width"), Value::Int(1920)];
        named(&mut run).unwrap();
        assert_eq!(run[0], Value::named("width", Value::Int(1920)));

        let mut run = vec![Value::Int(1), Value::Int(2)];
        assert!(named(&mut run).is_err());
    }

    #[test]
    fn hash_is_stable_and_respects_capabilities() {
        let mut a = vec![Value::from("x")];
        let mut b = vec![Value::from("x")];
        hash(&mut a).unwrap();
        hash(&mut b).unwrap();
        assert_eq!(a[0], b[0]);

        let mut run = vec![Value::object(ObjectRef::new(Connection::new(9)))];
        hash(&mut run).unwrap();
        assert_eq!(run[0], Value::Int(9));

        let drops = Arc::new(AtomicUsize::new(0));
        let mut run = vec![Value::object(ObjectRef::new(Probe::new(&drops)))];
        assert!(matches!(hash(&mut run), Err(EngineError::Unsupported(_))));
    }

    #[test]
    fn call_runs_the_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = ObjectRef::new(Probe::new(&drops));
        let mut run = vec![Value::object(obj.clone()), Value::Nil, Value::Nil];
        let kept = call(&mut run).unwrap();
        assert_eq!(kept, 1);
        assert_eq!(run[0], Value::Int(2));

        let mut run = vec![Value::object(ObjectRef::new(Connection::new(1)))];
        assert!(matches!(call(&mut run), Err(EngineError::Unsupported(_))));
    }

    #[test]
    fn log_validates_level_and_keeps_nothing() {
        let mut run = vec![Value::from("plugin"), Value::Int(3), Value::from("hello")];
        assert_eq!(log(&mut run).unwrap(), 0);
        let mut run = vec![Value::from("plugin"), Value::Int(9)];
        assert!(log(&mut run).is_err());
        let mut run = vec![Value::from("plugin")];
        assert!(log(&mut run).is_err());
    }

    #[test]
    fn exec_spawns_and_returns_pid() {
        let mut run = vec![Value::from("true")];
        assert_eq!(exec(&mut run).unwrap(), 1);
        assert!(run[0].as_int().unwrap() > 0);
    }

    #[test]
    fn exec_of_missing_binary_is_not_found() {
        let mut run = vec![Value::from("/nonexistent/waysome-test-binary")];
        assert!(matches!(exec(&mut run), Err(EngineError::NotFound(_))));
    }
}
