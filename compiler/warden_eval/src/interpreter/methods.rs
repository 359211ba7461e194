//! Native type resolution and method dispatch.
//!
//! Every member access passes the sandbox's member check before dispatch,
//! whatever the receiver. Built-in receivers (lists, maps, sets, strings)
//! dispatch by method name with direct pattern matching; native types
//! dispatch through the host's [`NativeRegistry`](crate::NativeRegistry).

use smallvec::SmallVec;
use warden_ir::{Name, NodeId, NodeRange};
use warden_value::errors::{
    class_not_allowed, name_not_found, no_such_method, type_mismatch, wrong_arg_count,
};
use warden_value::{
    Accounting, ClassHandle, EvalError, EvalResult, ExecList, ExecMap, ExecSet, Key, Value,
};

use super::Interpreter;
use crate::program::Flow;
use crate::scope::ScopeRef;

impl Interpreter<'_> {
    /// Resolve a type name: imports first, then the fully-qualified name.
    ///
    /// The sandbox decides before the registry is consulted, so a denied
    /// type is `ClassNotAllowed` whether or not the host registered it.
    pub(super) fn resolve_type(&self, name: Name) -> EvalResult {
        let names = self.names();
        let sandbox = self.config.sandbox();
        let path = match self.config.import(name) {
            Some(path) if sandbox.is_class_allowed(path) => path.clone(),
            Some(path) => return Err(class_not_allowed(&path.display(names))),
            None => {
                let text = names.lookup(name);
                sandbox
                    .check_class(text)?
                    .ok_or_else(|| name_not_found(text))?
            }
        };
        match self.config.natives().class(&path) {
            Some(class) => Ok(Value::Class(class.handle().clone())),
            None => Err(name_not_found(&path.display(names))),
        }
    }

    pub(super) fn eval_method_call(
        &self,
        receiver: NodeId,
        method: Name,
        args: NodeRange,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        let receiver = value!(self.eval(receiver, scope)?);
        let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
        for &arg in self.arena.list(args) {
            values.push(value!(self.eval(arg, scope)?));
        }

        let method_name = self.names().lookup(method);
        let owner = match &receiver {
            Value::Class(handle) => Some(&handle.path),
            _ => None,
        };
        self.config.sandbox().check_member(owner, method_name)?;

        let result = match &receiver {
            Value::Class(handle) => self.call_native(handle, method, method_name, &values),
            Value::List(list) => dispatch_list(list, method_name, &values),
            Value::Map(map) => dispatch_map(map, method_name, &values),
            Value::Set(set) => dispatch_set(set, method_name, &values),
            Value::Str(text) => dispatch_str(text, method_name, &values, self.authority()),
            other => Err(no_such_method(method_name, other.type_name())),
        }?;
        Ok(Flow::Normal(result))
    }

    fn call_native(
        &self,
        handle: &ClassHandle,
        method: Name,
        method_name: &str,
        args: &[Value],
    ) -> EvalResult {
        let native = self
            .config
            .natives()
            .class(&handle.path)
            .and_then(|class| class.method(method))
            .ok_or_else(|| no_such_method(method_name, &handle.name))?;
        native(args, self.ctx)
    }
}

// Argument helpers

fn require_args(method: &str, expected: usize, args: &[Value]) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(wrong_arg_count(method, expected, args.len()))
    }
}

/// Between `min` and `max` arguments; the error reports `max`.
fn require_args_between(
    method: &str,
    min: usize,
    max: usize,
    args: &[Value],
) -> Result<(), EvalError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(wrong_arg_count(method, max, args.len()))
    }
}

fn arg_type_name(args: &[Value], index: usize) -> &'static str {
    args.get(index).map_or("nothing", Value::type_name)
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, EvalError> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| type_mismatch("int", arg_type_name(args, index)))
}

fn opt_int_arg(args: &[Value], index: usize, default: i64) -> Result<i64, EvalError> {
    if index < args.len() {
        int_arg(args, index)
    } else {
        Ok(default)
    }
}

fn str_arg(args: &[Value], index: usize) -> Result<&str, EvalError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| type_mismatch("str", arg_type_name(args, index)))
}

/// Optional sort direction; ascending when absent.
fn ascending_arg(args: &[Value]) -> Result<bool, EvalError> {
    match args.first() {
        None => Ok(true),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| type_mismatch("bool", value.type_name())),
    }
}

fn key_arg(args: &[Value], index: usize) -> Result<Key, EvalError> {
    Key::try_from(args.get(index).unwrap_or(&Value::Null))
}

/// Elements of a list or set argument.
fn elements_arg(args: &[Value], index: usize) -> Result<Vec<Value>, EvalError> {
    match args.get(index) {
        Some(Value::List(list)) => Ok(list.values()),
        Some(Value::Set(set)) => Ok(set.values()),
        _ => Err(type_mismatch("list", arg_type_name(args, index))),
    }
}

fn len_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

// Receiver dispatch

fn dispatch_list(list: &ExecList, method: &str, args: &[Value]) -> EvalResult {
    match method {
        "size" | "length" => {
            require_args(method, 0, args)?;
            Ok(len_value(list.len()))
        }
        "isEmpty" => {
            require_args(method, 0, args)?;
            Ok(Value::Bool(list.is_empty()))
        }
        "get" => {
            require_args(method, 1, args)?;
            list.get(int_arg(args, 0)?)
        }
        "set" => {
            require_args(method, 2, args)?;
            list.set(int_arg(args, 0)?, args[1].clone())
        }
        "push" => {
            require_args(method, 1, args)?;
            list.push(args[0].clone())?;
            Ok(Value::Bool(true))
        }
        "add" if args.len() == 2 => {
            list.insert(int_arg(args, 0)?, args[1].clone())?;
            Ok(Value::Null)
        }
        "add" => {
            require_args(method, 1, args)?;
            list.push(args[0].clone())?;
            Ok(Value::Bool(true))
        }
        "pop" => {
            require_args(method, 0, args)?;
            list.pop()
        }
        "shift" => {
            require_args(method, 0, args)?;
            list.shift()
        }
        "unshift" => {
            require_args(method, 1, args)?;
            list.unshift(args[0].clone())?;
            Ok(Value::Null)
        }
        "addAll" if args.len() == 2 => {
            list.insert_all(int_arg(args, 0)?, &elements_arg(args, 1)?)?;
            Ok(Value::Bool(true))
        }
        "addAll" => {
            require_args(method, 1, args)?;
            list.add_all(&elements_arg(args, 0)?)?;
            Ok(Value::Bool(true))
        }
        "removeAt" => {
            require_args(method, 1, args)?;
            list.remove_at(int_arg(args, 0)?)
        }
        "remove" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(list.remove_value(&args[0])?))
        }
        "contains" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(list.contains(&args[0])))
        }
        "containsAll" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(list.contains_all(&elements_arg(args, 0)?)))
        }
        "indexOf" => {
            require_args_between(method, 1, 2, args)?;
            Ok(Value::Int(list.index_of(&args[0], opt_int_arg(args, 1, 0)?)))
        }
        "join" => {
            require_args_between(method, 0, 1, args)?;
            let separator = if args.is_empty() { "," } else { str_arg(args, 0)? };
            Ok(Value::str(&list.join(separator)))
        }
        "slice" => {
            require_args_between(method, 0, 2, args)?;
            let start = opt_int_arg(args, 0, 0)?;
            let end = opt_int_arg(args, 1, i64::MAX)?;
            Ok(Value::List(list.slice(start, end)))
        }
        "subList" => {
            require_args(method, 2, args)?;
            Ok(Value::List(list.sub_list(int_arg(args, 0)?, int_arg(args, 1)?)?))
        }
        "concat" => {
            require_args(method, 1, args)?;
            let items = match &args[0] {
                Value::List(_) | Value::Set(_) => elements_arg(args, 0)?,
                single => vec![single.clone()],
            };
            Ok(Value::List(list.concat(&items)))
        }
        "sort" => {
            require_args_between(method, 0, 1, args)?;
            list.sort(ascending_arg(args)?)?;
            Ok(Value::Null)
        }
        "toSorted" => {
            require_args_between(method, 0, 1, args)?;
            Ok(Value::List(list.to_sorted(ascending_arg(args)?)?))
        }
        "reverse" => {
            require_args(method, 0, args)?;
            list.reverse()?;
            Ok(Value::Null)
        }
        "toReversed" => {
            require_args(method, 0, args)?;
            Ok(Value::List(list.to_reversed()))
        }
        "splice" => {
            if args.is_empty() {
                return Err(wrong_arg_count(method, 1, 0));
            }
            let start = int_arg(args, 0)?;
            let delete = opt_int_arg(args, 1, i64::MAX)?;
            Ok(Value::List(list.splice(start, delete, args.get(2..).unwrap_or(&[]))?))
        }
        "toSpliced" => {
            if args.is_empty() {
                return Err(wrong_arg_count(method, 1, 0));
            }
            let start = int_arg(args, 0)?;
            let delete = opt_int_arg(args, 1, i64::MAX)?;
            Ok(Value::List(list.to_spliced(start, delete, args.get(2..).unwrap_or(&[]))))
        }
        "with" => {
            require_args(method, 2, args)?;
            Ok(Value::List(list.with(int_arg(args, 0)?, args[1].clone())?))
        }
        "fill" => {
            require_args_between(method, 1, 3, args)?;
            let start = opt_int_arg(args, 1, 0)?;
            let end = opt_int_arg(args, 2, i64::MAX)?;
            list.fill(&args[0], start, end)?;
            Ok(Value::List(list.clone()))
        }
        "clear" => {
            require_args(method, 0, args)?;
            list.clear()?;
            Ok(Value::Null)
        }
        "toUnmodifiable" => {
            require_args(method, 0, args)?;
            Ok(Value::List(list.to_unmodifiable()))
        }
        _ => Err(no_such_method(method, "list")),
    }
}

fn dispatch_map(map: &ExecMap, method: &str, args: &[Value]) -> EvalResult {
    match method {
        "size" => {
            require_args(method, 0, args)?;
            Ok(len_value(map.len()))
        }
        "isEmpty" => {
            require_args(method, 0, args)?;
            Ok(Value::Bool(map.is_empty()))
        }
        "get" => {
            require_args(method, 1, args)?;
            Ok(map.get(&key_arg(args, 0)?))
        }
        "containsKey" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(map.contains_key(&key_arg(args, 0)?)))
        }
        "containsValue" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(map.contains_value(&args[0])))
        }
        "put" => {
            require_args(method, 2, args)?;
            map.put(key_arg(args, 0)?, args[1].clone())
        }
        "putAll" => {
            require_args(method, 1, args)?;
            let Value::Map(other) = &args[0] else {
                return Err(type_mismatch("map", args[0].type_name()));
            };
            map.put_all(other.pairs())?;
            Ok(Value::Null)
        }
        "putIfAbsent" => {
            require_args(method, 2, args)?;
            map.put_if_absent(key_arg(args, 0)?, args[1].clone())
        }
        "replace" if args.len() == 3 => Ok(Value::Bool(map.replace_if(
            key_arg(args, 0)?,
            &args[1],
            args[2].clone(),
        )?)),
        "replace" => {
            require_args(method, 2, args)?;
            map.replace(key_arg(args, 0)?, args[1].clone())
        }
        "remove" => {
            require_args(method, 1, args)?;
            map.remove(&key_arg(args, 0)?)
        }
        "clear" => {
            require_args(method, 0, args)?;
            map.clear()?;
            Ok(Value::Null)
        }
        "keys" | "keySet" => {
            require_args(method, 0, args)?;
            Ok(Value::List(map.keys()))
        }
        "values" => {
            require_args(method, 0, args)?;
            Ok(Value::List(map.values()))
        }
        "slice" => {
            require_args_between(method, 0, 2, args)?;
            let start = opt_int_arg(args, 0, 0)?;
            let end = opt_int_arg(args, 1, i64::MAX)?;
            Ok(Value::Map(map.slice(start, end)))
        }
        "clone" => {
            require_args(method, 0, args)?;
            Ok(Value::Map(map.duplicate()))
        }
        "sortByKey" => {
            require_args_between(method, 0, 1, args)?;
            map.sort_by_key(ascending_arg(args)?)?;
            Ok(Value::Null)
        }
        "sortByValue" => {
            require_args_between(method, 0, 1, args)?;
            map.sort_by_value(ascending_arg(args)?)?;
            Ok(Value::Null)
        }
        "toSorted" | "toSortedByKey" => {
            require_args_between(method, 0, 1, args)?;
            Ok(Value::Map(map.to_sorted_by_key(ascending_arg(args)?)?))
        }
        "toSortedByValue" => {
            require_args_between(method, 0, 1, args)?;
            Ok(Value::Map(map.to_sorted_by_value(ascending_arg(args)?)?))
        }
        "reverse" => {
            require_args(method, 0, args)?;
            map.reverse()?;
            Ok(Value::Null)
        }
        "toReversed" => {
            require_args(method, 0, args)?;
            Ok(Value::Map(map.to_reversed()))
        }
        "invert" => {
            require_args(method, 0, args)?;
            map.invert()?;
            Ok(Value::Null)
        }
        "toInverted" => {
            require_args(method, 0, args)?;
            Ok(Value::Map(map.to_inverted()?))
        }
        "toUnmodifiable" => {
            require_args(method, 0, args)?;
            Ok(Value::Map(map.to_unmodifiable()))
        }
        _ => Err(no_such_method(method, "map")),
    }
}

fn dispatch_set(set: &ExecSet, method: &str, args: &[Value]) -> EvalResult {
    match method {
        "size" => {
            require_args(method, 0, args)?;
            Ok(len_value(set.len()))
        }
        "isEmpty" => {
            require_args(method, 0, args)?;
            Ok(Value::Bool(set.is_empty()))
        }
        "add" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(set.add(&args[0])?))
        }
        "remove" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(set.remove(&args[0])?))
        }
        "contains" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(set.contains(&args[0])))
        }
        "containsAll" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(set.contains_all(&elements_arg(args, 0)?)))
        }
        "clear" => {
            require_args(method, 0, args)?;
            set.clear()?;
            Ok(Value::Null)
        }
        "toUnmodifiable" => {
            require_args(method, 0, args)?;
            Ok(Value::Set(set.to_unmodifiable()))
        }
        _ => Err(no_such_method(method, "set")),
    }
}

fn dispatch_str(text: &str, method: &str, args: &[Value], authority: Accounting) -> EvalResult {
    match method {
        "length" => {
            require_args(method, 0, args)?;
            Ok(len_value(text.chars().count()))
        }
        "isEmpty" => {
            require_args(method, 0, args)?;
            Ok(Value::Bool(text.is_empty()))
        }
        "toUpperCase" => {
            require_args(method, 0, args)?;
            Ok(Value::str(&text.to_uppercase()))
        }
        "toLowerCase" => {
            require_args(method, 0, args)?;
            Ok(Value::str(&text.to_lowercase()))
        }
        "trim" => {
            require_args(method, 0, args)?;
            Ok(Value::str(text.trim()))
        }
        "contains" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(text.contains(str_arg(args, 0)?)))
        }
        "startsWith" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(text.starts_with(str_arg(args, 0)?)))
        }
        "endsWith" => {
            require_args(method, 1, args)?;
            Ok(Value::Bool(text.ends_with(str_arg(args, 0)?)))
        }
        "split" => {
            require_args(method, 1, args)?;
            let parts = text.split(str_arg(args, 0)?).map(Value::str);
            Ok(Value::List(ExecList::from_values(authority, parts)))
        }
        _ => Err(no_such_method(method, "str")),
    }
}
