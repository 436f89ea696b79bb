//! Argument values for `@Arguments`
//!
//! One provider per parameter. Toggles alternate across invocations,
//! `RandomOnce` draws a value on first use and repeats it, `RandomEach`
//! draws a fresh value every time.

use jitcheck_core::{Argument, Error, ParamType, Result, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces the argument list for each invocation of one test.
#[derive(Debug)]
pub struct ArgumentsProvider {
    slots: Vec<Slot>,
    rng: StdRng,
}

#[derive(Debug)]
struct Slot {
    argument: Argument,
    ty: ParamType,
    toggle: bool,
    fixed: Option<Value>,
}

fn typed_number(ty: &ParamType, n: i64) -> Option<Value> {
    Some(match ty {
        ParamType::Byte => Value::Byte(n as i8),
        ParamType::Char => Value::Char(n as u16),
        ParamType::Short => Value::Short(n as i16),
        ParamType::Int => Value::Int(n as i32),
        ParamType::Long => Value::Long(n),
        ParamType::Float => Value::Float(n as f32),
        ParamType::Double => Value::Double(n as f64),
        _ => return None,
    })
}

fn extreme(ty: &ParamType, max: bool) -> Option<Value> {
    Some(match (ty, max) {
        (ParamType::Byte, false) => Value::Byte(i8::MIN),
        (ParamType::Byte, true) => Value::Byte(i8::MAX),
        (ParamType::Char, false) => Value::Char(u16::MIN),
        (ParamType::Char, true) => Value::Char(u16::MAX),
        (ParamType::Short, false) => Value::Short(i16::MIN),
        (ParamType::Short, true) => Value::Short(i16::MAX),
        (ParamType::Int, false) => Value::Int(i32::MIN),
        (ParamType::Int, true) => Value::Int(i32::MAX),
        (ParamType::Long, false) => Value::Long(i64::MIN),
        (ParamType::Long, true) => Value::Long(i64::MAX),
        (ParamType::Float, false) => Value::Float(f32::MIN),
        (ParamType::Float, true) => Value::Float(f32::MAX),
        (ParamType::Double, false) => Value::Double(f64::MIN),
        (ParamType::Double, true) => Value::Double(f64::MAX),
        _ => return None,
    })
}

fn random(rng: &mut StdRng, ty: &ParamType) -> Option<Value> {
    Some(match ty {
        ParamType::Boolean => Value::Bool(rng.gen()),
        ParamType::Byte => Value::Byte(rng.gen()),
        ParamType::Char => Value::Char(rng.gen()),
        ParamType::Short => Value::Short(rng.gen()),
        ParamType::Int => Value::Int(rng.gen()),
        ParamType::Long => Value::Long(rng.gen()),
        ParamType::Float => Value::Float(rng.gen_range(-1000.0..1000.0)),
        ParamType::Double => Value::Double(rng.gen_range(-1000.0..1000.0)),
        _ => return None,
    })
}

impl ArgumentsProvider {
    /// Provider for `arguments`, one per entry of `params`.
    ///
    /// # Errors
    ///
    /// [`Error::TestRun`] on an arity mismatch.
    pub fn new(arguments: &[Argument], params: &[ParamType], seed: u64) -> Result<Self> {
        if arguments.len() != params.len() {
            return Err(Error::test_run(format!(
                "{} argument providers for {} parameters",
                arguments.len(),
                params.len()
            )));
        }
        let slots = arguments
            .iter()
            .zip(params)
            .map(|(argument, ty)| Slot {
                argument: *argument,
                ty: ty.clone(),
                toggle: matches!(argument, Argument::BooleanToggleFirstTrue),
                fixed: None,
            })
            .collect();
        Ok(Self {
            slots,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Provider for a test without parameters.
    pub fn empty() -> Self {
        Self {
            slots: Vec::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Arguments for the next invocation.
    pub fn next_args(&mut self) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in &mut self.slots {
            values.push(slot.next(&mut self.rng)?);
        }
        Ok(values)
    }
}

impl Slot {
    fn next(&mut self, rng: &mut StdRng) -> Result<Value> {
        let value = match self.argument {
            Argument::Default => match &self.ty {
                ParamType::Object(class) => class.default_ctor.map(|ctor| ctor()),
                ty => Some(Value::zero(ty)),
            },
            Argument::Number42 => typed_number(&self.ty, 42),
            Argument::NumberMinus42 => typed_number(&self.ty, -42),
            Argument::Min => extreme(&self.ty, false),
            Argument::Max => extreme(&self.ty, true),
            Argument::True => Some(Value::Bool(true)),
            Argument::False => Some(Value::Bool(false)),
            Argument::BooleanToggleFirstFalse | Argument::BooleanToggleFirstTrue => {
                let current = self.toggle;
                self.toggle = !current;
                Some(Value::Bool(current))
            }
            Argument::RandomOnce => {
                if self.fixed.is_none() {
                    self.fixed = random(rng, &self.ty);
                }
                self.fixed.clone()
            }
            Argument::RandomEach => random(rng, &self.ty),
        };
        value.ok_or_else(|| {
            Error::test_run(format!(
                "cannot provide {:?} for a parameter of type {}",
                self.argument, self.ty
            ))
        })
    }
}
