use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;
use rand::Rng;

use super::object::{BuiltinFunction, Object};

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, BuiltinFunction> = {
        let mut builtins: HashMap<&'static str, BuiltinFunction> = HashMap::new();
        builtins.insert("len", Builtins::len_fn);
        builtins.insert("min", Builtins::min_fn);
        builtins.insert("max", Builtins::max_fn);
        builtins.insert("rand", Builtins::rand_fn);
        builtins.insert("first", Builtins::first_fn);
        builtins.insert("last", Builtins::last_fn);
        builtins.insert("rest", Builtins::rest_fn);
        builtins.insert("push", Builtins::push_fn);
        builtins.insert("pop", Builtins::pop_fn);
        builtins.insert("remove", Builtins::remove_fn);
        builtins.insert("unshift", Builtins::unshift_fn);
        builtins.insert("shift", Builtins::shift_fn);
        builtins.insert("includes", Builtins::includes_fn);
        builtins.insert("trim", Builtins::trim_fn);
        builtins.insert("split", Builtins::split_fn);
        builtins.insert("puts", Builtins::puts_fn);
        builtins
    };
}

/// Native functions resolved by name after every scope has been searched.
/// Every function returns a fresh value and never touches its arguments.
pub struct Builtins;

impl Builtins {
    pub fn lookup(name: &str) -> Option<Object> {
        BUILTINS
            .get_key_value(name)
            .map(|(name, function)| Object::BuiltInFunction {
                name: *name,
                function: *function,
            })
    }

    fn check_arity(name: &str, args: &[Object], want: usize) -> Result<()> {
        if args.len() != want {
            bail!(
                "wrong number of arguments for {}: want={}, got={}",
                name,
                want,
                args.len()
            );
        }
        Ok(())
    }

    fn puts_fn(args: Vec<Object>) -> Result<Object> {
        for arg in args {
            println!("{}", arg);
        }
        Ok(Object::Null)
    }

    fn len_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("len", &args, 1)?;

        match &args[0] {
            Object::String(value) => Ok(Object::Integer(value.len() as i64)),
            Object::Array(value) => Ok(Object::Integer(value.len() as i64)),
            other => Err(anyhow!(
                "argument to `len` not supported, got {}",
                other.type_name()
            )),
        }
    }

    fn min_fn(args: Vec<Object>) -> Result<Object> {
        let (a, b) = Self::integer_pair("min", &args)?;
        Ok(Object::Integer(a.min(b)))
    }

    fn max_fn(args: Vec<Object>) -> Result<Object> {
        let (a, b) = Self::integer_pair("max", &args)?;
        Ok(Object::Integer(a.max(b)))
    }

    fn integer_pair(name: &str, args: &[Object]) -> Result<(i64, i64)> {
        Self::check_arity(name, args, 2)?;

        match (&args[0], &args[1]) {
            (Object::Integer(a), Object::Integer(b)) => Ok((*a, *b)),
            (Object::Integer(_), other) => Err(anyhow!(
                "argument 2 to `{}` must be INTEGER, got {}",
                name,
                other.type_name()
            )),
            (other, _) => Err(anyhow!(
                "argument 1 to `{}` must be INTEGER, got {}",
                name,
                other.type_name()
            )),
        }
    }

    fn rand_fn(args: Vec<Object>) -> Result<Object> {
        let mut rng = rand::thread_rng();
        match args.as_slice() {
            [] => Ok(Object::Integer(rng.gen_range(0..=i64::MAX))),
            [Object::Integer(bound)] if *bound > 0 => Ok(Object::Integer(rng.gen_range(0..*bound))),
            [Object::Integer(bound)] => bail!("argument to `rand` must be positive, got {}", bound),
            [other] => bail!(
                "argument to `rand` must be INTEGER, got {}",
                other.type_name()
            ),
            _ => bail!(
                "wrong number of arguments for rand: want=0 or 1, got={}",
                args.len()
            ),
        }
    }

    fn array_arg<'a>(name: &str, args: &'a [Object]) -> Result<&'a Vec<Object>> {
        match args.first() {
            Some(Object::Array(elements)) => Ok(elements),
            Some(other) => Err(anyhow!(
                "argument to `{}` must be ARRAY, got {}",
                name,
                other.type_name()
            )),
            None => Err(anyhow!("argument to `{}` not provided", name)),
        }
    }

    fn first_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("first", &args, 1)?;
        let elements = Self::array_arg("first", &args)?;
        Ok(elements.first().cloned().unwrap_or(Object::Null))
    }

    fn last_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("last", &args, 1)?;
        let elements = Self::array_arg("last", &args)?;
        Ok(elements.last().cloned().unwrap_or(Object::Null))
    }

    fn rest_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("rest", &args, 1)?;
        let elements = Self::array_arg("rest", &args)?;
        if elements.is_empty() {
            return Ok(Object::Null);
        }
        Ok(Object::Array(elements[1..].to_vec()))
    }

    fn push_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("push", &args, 2)?;
        let elements = Self::array_arg("push", &args)?;
        let mut new_array = elements.clone();
        new_array.push(args[1].clone());
        Ok(Object::Array(new_array))
    }

    fn pop_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("pop", &args, 1)?;
        let elements = Self::array_arg("pop", &args)?;
        let end = elements.len().saturating_sub(1);
        Ok(Object::Array(elements[..end].to_vec()))
    }

    fn shift_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("shift", &args, 1)?;
        let elements = Self::array_arg("shift", &args)?;
        let start = elements.len().min(1);
        Ok(Object::Array(elements[start..].to_vec()))
    }

    fn remove_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("remove", &args, 2)?;
        let elements = Self::array_arg("remove", &args)?;

        let index = match &args[1] {
            Object::Integer(index) => *index,
            other => bail!(
                "argument 2 to `remove` must be INTEGER, got {}",
                other.type_name()
            ),
        };

        let position = usize::try_from(index)
            .ok()
            .filter(|position| *position < elements.len())
            .ok_or_else(|| {
                anyhow!(
                    "index {} out of bounds in array of length {}",
                    index,
                    elements.len()
                )
            })?;

        let mut new_array = elements.clone();
        new_array.remove(position);
        Ok(Object::Array(new_array))
    }

    // An array argument is spliced in front; any other value is prepended whole.
    fn unshift_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("unshift", &args, 2)?;
        let elements = Self::array_arg("unshift", &args)?;

        let mut new_array = match &args[1] {
            Object::Array(prefix) => prefix.clone(),
            value => vec![value.clone()],
        };
        new_array.extend(elements.iter().cloned());
        Ok(Object::Array(new_array))
    }

    fn includes_fn(args: Vec<Object>) -> Result<Object> {
        Self::check_arity("includes", &args, 2)?;

        match (&args[0], &args[1]) {
            (Object::Array(elements), needle @ (Object::Integer(_) | Object::String(_))) => {
                Ok(Object::Boolean(elements.contains(needle)))
            }
            (Object::String(haystack), Object::String(needle)) => {
                Ok(Object::Boolean(haystack.contains(needle.as_str())))
            }
            (Object::Array(_) | Object::String(_), other) => bail!(
                "argument 2 to `includes` not supported, got {}",
                other.type_name()
            ),
            (other, _) => bail!(
                "argument 1 to `includes` not supported, got {}",
                other.type_name()
            ),
        }
    }

    fn string_pair<'a>(name: &str, args: &'a [Object]) -> Result<(&'a str, &'a str)> {
        Self::check_arity(name, args, 2)?;

        match (&args[0], &args[1]) {
            (Object::String(a), Object::String(b)) => Ok((a.as_str(), b.as_str())),
            (Object::String(_), other) => bail!(
                "argument 2 to `{}` must be STRING, got {}",
                name,
                other.type_name()
            ),
            (other, _) => bail!(
                "argument 1 to `{}` must be STRING, got {}",
                name,
                other.type_name()
            ),
        }
    }

    fn trim_fn(args: Vec<Object>) -> Result<Object> {
        let (value, cutset) = Self::string_pair("trim", &args)?;
        let trimmed = value.trim_matches(|c: char| cutset.contains(c));
        Ok(Object::String(trimmed.to_string()))
    }

    fn split_fn(args: Vec<Object>) -> Result<Object> {
        let (value, separator) = Self::string_pair("split", &args)?;
        let pieces: Vec<Object> = if separator.is_empty() {
            value
                .chars()
                .map(|c| Object::String(c.to_string()))
                .collect()
        } else {
            value
                .split(separator)
                .map(|piece| Object::String(piece.to_string()))
                .collect()
        };
        Ok(Object::Array(pieces))
    }
}
