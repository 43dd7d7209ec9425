use std::{fmt::Debug, io::Write};

use crate::{errors, TugaError};

use super::{Constant, OpCode, Program, Value};

/// Upper bound on the evaluation stack, in slots. Runaway recursion trips
/// this before the process runs out of memory.
const STACK_LIMIT: usize = 1 << 20;

/// The Tuga virtual machine: an evaluation stack, a global memory region and
/// two registers (`ip` and `fp`). A single machine can run several programs
/// in sequence; its state is reset at the start of each run.
pub struct Vm {
    trace: bool,
    output: Box<dyn std::io::Write>,

    stack: Vec<Value>,
    globals: Vec<Value>,
    ip: usize,
    fp: usize,
}

macro_rules! op_binary {
    ($self:ident[$at:ident], $pop:ident ($left:ident, $right:ident) => $res:ident($value:expr)) => {{
        let $right = $self.$pop($at)?;
        let $left = $self.$pop($at)?;

        #[allow(unused_parens)]
        let value = $value;
        $self.push($at, Value::$res(value))?
    }};
}

impl Vm {
    pub fn with_output(self, output: Box<dyn std::io::Write>) -> Self {
        Self { output, ..self }
    }

    pub fn with_trace(self) -> Self {
        Self { trace: true, ..self }
    }

    pub fn run(&mut self, program: &Program) -> Result<(), TugaError> {
        self.stack.clear();
        self.globals.clear();
        self.ip = 0;
        self.fp = 0;

        while self.ip < program.code.len() {
            let at = self.ip;
            let op = program.code[at];

            if self.trace {
                eprintln!("{:>5}: {:<12} fp={} {:?}", at, format!("{}", op), self.fp, self.stack);
            }

            self.ip += 1;
            self.step(program, at, op)?;
        }

        Ok(())
    }

    fn step(&mut self, program: &Program, at: usize, op: OpCode) -> Result<(), TugaError> {
        match op {
            OpCode::Iconst(value) => self.push(at, Value::Int(value))?,
            OpCode::Dconst(index) => match program.pool.get(index) {
                Some(Constant::Real(value)) => {
                    let value = *value;
                    self.push(at, Value::Real(value))?
                }
                _ => {
                    return Err(errors::runtime(
                        at,
                        format!("constant {} is not a real in the constant pool", index),
                        "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                    ))
                }
            },
            OpCode::Sconst(index) => match program.pool.get(index) {
                Some(Constant::Str(value)) => {
                    let value = value.clone();
                    self.push(at, Value::Str(value))?
                }
                _ => {
                    return Err(errors::runtime(
                        at,
                        format!("constant {} is not a string in the constant pool", index),
                        "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                    ))
                }
            },
            OpCode::Tconst => self.push(at, Value::Int(1))?,
            OpCode::Fconst => self.push(at, Value::Int(0))?,

            OpCode::Jump(target) => self.ip = target,
            OpCode::Jumpf(target) => {
                if !self.pop_bool(at)? {
                    self.ip = target;
                }
            }
            OpCode::Halt => self.ip = program.code.len(),

            OpCode::Galloc(count) => {
                self.globals.extend(std::iter::repeat_with(Value::default).take(count));
            }
            OpCode::Gload(address) => {
                let value = match self.globals.get(address) {
                    None => {
                        return Err(errors::runtime(
                            at,
                            format!("global address {} was never allocated", address),
                            "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                        ))
                    }
                    Some(Value::Null) => {
                        return Err(errors::runtime(
                            at,
                            "tentativa de acesso a valor NULO",
                            "Assign the variable a value before reading it.",
                        ))
                    }
                    Some(value) => value.clone(),
                };
                self.push(at, value)?;
            }
            OpCode::Gstore(address) => {
                let value = self.pop(at)?;
                match self.globals.get_mut(address) {
                    Some(slot) => *slot = value,
                    None => {
                        return Err(errors::runtime(
                            at,
                            format!("global address {} was never allocated", address),
                            "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                        ))
                    }
                }
            }

            OpCode::Lalloc(count) => {
                for _ in 0..count {
                    self.push(at, Value::Null)?;
                }
            }
            OpCode::Lload(address) => {
                let slot = self.local_slot(at, address)?;
                let value = self.stack[slot].clone();
                if value == Value::Null {
                    return Err(errors::runtime(
                        at,
                        "tentativa de acesso a valor NULO",
                        "Assign the variable a value before reading it.",
                    ));
                }
                self.push(at, value)?;
            }
            OpCode::Lstore(address) => {
                let value = self.pop(at)?;
                let slot = self.local_slot(at, address)?;
                self.stack[slot] = value;
            }
            OpCode::Pop(count) => {
                if self.stack.len() < count {
                    return Err(errors::runtime(
                        at,
                        format!("attempted to discard {} values with only {} on the stack", count, self.stack.len()),
                        "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                    ));
                }
                self.stack.truncate(self.stack.len() - count);
            }

            OpCode::Call(target) => {
                let fp = self.fp;
                let ret = self.ip;
                self.push(at, Value::Int(fp as i32))?;
                self.push(at, Value::Int(ret as i32))?;
                self.fp = self.stack.len() - 2;
                self.ip = target;
            }
            OpCode::Ret(params) => self.unwind(at, params)?,
            OpCode::Retval(params) => {
                let result = self.pop(at)?;
                self.unwind(at, params)?;
                self.push(at, result)?;
            }

            OpCode::Iprint => {
                let value = self.pop_int(at)?;
                writeln!(self.output, "{}", value)?;
            }
            OpCode::Iuminus => {
                let value = self.pop_int(at)?;
                self.push(at, Value::Int(value.wrapping_neg()))?;
            }
            OpCode::Iadd => op_binary!(self[at], pop_int(left, right) => Int(left.wrapping_add(right))),
            OpCode::Isub => op_binary!(self[at], pop_int(left, right) => Int(left.wrapping_sub(right))),
            OpCode::Imult => op_binary!(self[at], pop_int(left, right) => Int(left.wrapping_mul(right))),
            OpCode::Idiv => {
                let right = self.pop_int(at)?;
                let left = self.pop_int(at)?;
                if right == 0 {
                    return Err(errors::runtime(at, "division by zero", "Make sure the divisor is never zero."));
                }
                self.push(at, Value::Int(left.wrapping_div(right)))?;
            }
            OpCode::Imod => {
                let right = self.pop_int(at)?;
                let left = self.pop_int(at)?;
                if right == 0 {
                    return Err(errors::runtime(at, "division by zero", "Make sure the divisor is never zero."));
                }
                self.push(at, Value::Int(left.wrapping_rem(right)))?;
            }
            OpCode::Ieq => op_binary!(self[at], pop_int(left, right) => Int((left == right) as i32)),
            OpCode::Ineq => op_binary!(self[at], pop_int(left, right) => Int((left != right) as i32)),
            OpCode::Ilt => op_binary!(self[at], pop_int(left, right) => Int((left < right) as i32)),
            OpCode::Ileq => op_binary!(self[at], pop_int(left, right) => Int((left <= right) as i32)),
            OpCode::Itod => {
                let value = self.pop_int(at)?;
                self.push(at, Value::Real(value as f64))?;
            }
            OpCode::Itos => {
                let value = self.pop_int(at)?;
                self.push(at, Value::Str(value.to_string()))?;
            }

            OpCode::Dprint => {
                let value = self.pop_real(at)?;
                writeln!(self.output, "{}", Value::Real(value))?;
            }
            OpCode::Duminus => {
                let value = self.pop_real(at)?;
                self.push(at, Value::Real(-value))?;
            }
            OpCode::Dadd => op_binary!(self[at], pop_real(left, right) => Real(left + right)),
            OpCode::Dsub => op_binary!(self[at], pop_real(left, right) => Real(left - right)),
            OpCode::Dmult => op_binary!(self[at], pop_real(left, right) => Real(left * right)),
            OpCode::Ddiv => {
                let right = self.pop_real(at)?;
                let left = self.pop_real(at)?;
                if right == 0.0 {
                    return Err(errors::runtime(at, "division by zero", "Make sure the divisor is never zero."));
                }
                self.push(at, Value::Real(left / right))?;
            }
            OpCode::Deq => op_binary!(self[at], pop_real(left, right) => Int((left == right) as i32)),
            OpCode::Dneq => op_binary!(self[at], pop_real(left, right) => Int((left != right) as i32)),
            OpCode::Dlt => op_binary!(self[at], pop_real(left, right) => Int((left < right) as i32)),
            OpCode::Dleq => op_binary!(self[at], pop_real(left, right) => Int((left <= right) as i32)),
            OpCode::Dtos => {
                let value = self.pop_real(at)?;
                self.push(at, Value::Str(Value::Real(value).to_string()))?;
            }

            OpCode::Sprint => {
                let value = self.pop_str(at)?;
                writeln!(self.output, "{}", value)?;
            }
            OpCode::Sconcat => op_binary!(self[at], pop_str(left, right) => Str(format!("{}{}", left, right))),
            OpCode::Seq => op_binary!(self[at], pop_str(left, right) => Int((left == right) as i32)),
            OpCode::Sneq => op_binary!(self[at], pop_str(left, right) => Int((left != right) as i32)),

            OpCode::Bprint => {
                let value = self.pop_bool(at)?;
                writeln!(self.output, "{}", if value { "verdadeiro" } else { "falso" })?;
            }
            OpCode::Beq => op_binary!(self[at], pop_bool(left, right) => Int((left == right) as i32)),
            OpCode::Bneq => op_binary!(self[at], pop_bool(left, right) => Int((left != right) as i32)),
            OpCode::And => op_binary!(self[at], pop_bool(left, right) => Int((left && right) as i32)),
            OpCode::Or => op_binary!(self[at], pop_bool(left, right) => Int((left || right) as i32)),
            OpCode::Not => {
                let value = self.pop_bool(at)?;
                self.push(at, Value::Int(!value as i32))?;
            }
            OpCode::Btos => {
                let value = self.pop_bool(at)?;
                self.push(at, Value::Str(if value { "verdadeiro" } else { "falso" }.to_string()))?;
            }
        }

        Ok(())
    }

    /// Tears down the current frame: restores `ip` and `fp` from the frame
    /// header and discards the frame along with its `params` arguments.
    fn unwind(&mut self, at: usize, params: usize) -> Result<(), TugaError> {
        let (saved_fp, ret) = match (self.stack.get(self.fp), self.stack.get(self.fp + 1)) {
            (Some(Value::Int(saved_fp)), Some(Value::Int(ret))) if *saved_fp >= 0 && *ret >= 0 => {
                (*saved_fp as usize, *ret as usize)
            }
            _ => {
                return Err(errors::runtime(
                    at,
                    "the frame header at the frame pointer is inconsistent",
                    "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
                ))
            }
        };

        if params > self.fp {
            return Err(errors::runtime(
                at,
                format!("a return discards {} arguments but the frame starts at {}", params, self.fp),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            ));
        }

        self.stack.truncate(self.fp - params);
        self.fp = saved_fp;
        self.ip = ret;
        Ok(())
    }

    fn local_slot(&self, at: usize, address: i32) -> Result<usize, TugaError> {
        let slot = self.fp as i64 + address as i64;
        if slot < 0 || slot as usize >= self.stack.len() {
            return Err(errors::runtime(
                at,
                format!("local address {} falls outside the current frame", address),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            ));
        }

        Ok(slot as usize)
    }

    fn push(&mut self, at: usize, value: Value) -> Result<(), TugaError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(errors::runtime(
                at,
                "the evaluation stack overflowed",
                "Make sure the program does not recurse without bound.",
            ));
        }

        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, at: usize) -> Result<Value, TugaError> {
        self.stack.pop().ok_or_else(|| {
            errors::runtime(
                at,
                "attempted to pop from an empty stack",
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            )
        })
    }

    fn pop_int(&mut self, at: usize) -> Result<i32, TugaError> {
        match self.pop(at)? {
            Value::Int(value) => Ok(value),
            Value::Null => Err(errors::runtime(
                at,
                "tentativa de acesso a valor NULO",
                "Assign the variable a value before reading it.",
            )),
            value => Err(errors::runtime(
                at,
                format!("expected an integer on the stack but found a {}", value.type_name()),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            )),
        }
    }

    fn pop_real(&mut self, at: usize) -> Result<f64, TugaError> {
        match self.pop(at)? {
            Value::Real(value) => Ok(value),
            Value::Null => Err(errors::runtime(
                at,
                "tentativa de acesso a valor NULO",
                "Assign the variable a value before reading it.",
            )),
            value => Err(errors::runtime(
                at,
                format!("expected a real on the stack but found a {}", value.type_name()),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            )),
        }
    }

    fn pop_str(&mut self, at: usize) -> Result<String, TugaError> {
        match self.pop(at)? {
            Value::Str(value) => Ok(value),
            Value::Null => Err(errors::runtime(
                at,
                "tentativa de acesso a valor NULO",
                "Assign the variable a value before reading it.",
            )),
            value => Err(errors::runtime(
                at,
                format!("expected a string on the stack but found a {}", value.type_name()),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            )),
        }
    }

    // Booleans live on the stack as the integers 0 and 1; anything else at a
    // boolean opcode means the bytecode is malformed.
    fn pop_bool(&mut self, at: usize) -> Result<bool, TugaError> {
        match self.pop_int(at)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(errors::runtime(
                at,
                format!("expected a boolean on the stack but found the integer {}", value),
                "Make sure the bytecode was produced by the Tuga compiler and has not been corrupted.",
            )),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self {
            trace: false,
            output: Box::new(std::io::stdout()),

            stack: Vec::new(),
            globals: Vec::new(),
            ip: 0,
            fp: 0,
        }
    }
}

impl Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "ip={} fp={}", self.ip, self.fp)?;

        write!(f, "Stack:")?;
        for value in self.stack.iter() {
            write!(f, "[{}] ", value)?;
        }
        writeln!(f)?;

        write!(f, "Globals:")?;
        for value in self.globals.iter() {
            write!(f, "[{}] ", value)?;
        }
        writeln!(f)
    }
}
