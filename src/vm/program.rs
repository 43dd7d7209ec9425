use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::{errors, TugaError};

use super::{Constant, ConstantPool, OpCode};

const TAG_REAL: u8 = 1;
const TAG_STR: u8 = 2;

/// A compiled Tuga program: its constant pool followed by its instruction
/// stream. This is the in-memory form of the `.bc` file format: an int32
/// entry count, the tagged pool entries, and then opcodes (with their int32
/// operands) until the end of the file. All multi-byte values are big-endian
/// and strings are stored as UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub pool: ConstantPool,
    pub code: Vec<OpCode>,
}

impl Program {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), TugaError> {
        write_i32(writer, self.pool.len() as i32)?;

        for constant in self.pool.iter() {
            match constant {
                Constant::Real(value) => {
                    writer.write_all(&[TAG_REAL])?;
                    writer.write_all(&value.to_be_bytes())?;
                }
                Constant::Str(value) => {
                    let units: Vec<u16> = value.encode_utf16().collect();
                    writer.write_all(&[TAG_STR])?;
                    write_i32(writer, (units.len() * 2) as i32)?;
                    for unit in units {
                        writer.write_all(&unit.to_be_bytes())?;
                    }
                }
            }
        }

        for op in &self.code {
            writer.write_all(&[op.byte()])?;
            if let Some(arg) = op.operand() {
                write_i32(writer, arg)?;
            }
        }

        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Program, TugaError> {
        let count = read_i32(reader)?;
        if count < 0 {
            return Err(errors::bytecode(
                format!("The constant pool declares a negative entry count ({}).", count),
                "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
            ));
        }

        let mut pool = ConstantPool::default();
        for _ in 0..count {
            match read_u8(reader)? {
                TAG_REAL => {
                    let mut buf = [0u8; 8];
                    reader.read_exact(&mut buf)?;
                    pool.push(Constant::Real(f64::from_be_bytes(buf)));
                }
                TAG_STR => {
                    let bytes = read_i32(reader)?;
                    if bytes < 0 || bytes % 2 != 0 {
                        return Err(errors::bytecode(
                            format!("A string constant declares an invalid byte length ({}).", bytes),
                            "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
                        ));
                    }

                    let mut units = Vec::with_capacity(bytes as usize / 2);
                    for _ in 0..bytes / 2 {
                        let mut buf = [0u8; 2];
                        reader.read_exact(&mut buf)?;
                        units.push(u16::from_be_bytes(buf));
                    }

                    let value = String::from_utf16(&units).map_err(|_| {
                        errors::bytecode(
                            "A string constant is not valid UTF-16.",
                            "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
                        )
                    })?;
                    pool.push(Constant::Str(value));
                }
                tag => {
                    return Err(errors::bytecode(
                        format!("Unknown constant pool tag {}.", tag),
                        "Make sure the bytecode file was produced by the Tuga compiler and has not been corrupted.",
                    ))
                }
            }
        }

        // The instruction stream runs to the end of the file.
        let mut code = Vec::new();
        while let Some(byte) = next_byte(reader)? {
            let arg = if OpCode::takes_operand(byte) {
                read_i32(reader)?
            } else {
                0
            };

            code.push(OpCode::decode(byte, arg)?);
        }

        Ok(Program { pool, code })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TugaError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Program, TugaError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> std::io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, TugaError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, TugaError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads one byte, returning `None` at a clean end of stream.
fn next_byte<R: Read>(reader: &mut R) -> Result<Option<u8>, TugaError> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
