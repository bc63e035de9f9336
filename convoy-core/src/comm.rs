//! Element types for the collective-communication layer
//!
//! Maps array element types, named the numpy way, to the type tags the
//! message-passing layer expects in its buffer descriptors.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConvoyError, Result};

/// Array element type, keyed by numpy type character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    LongLong,
    ULongLong,
    Float32,
    Float64,
}

/// Native type tag of the collective layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpiType {
    CBool,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    Unsigned,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
}

impl ElementType {
    /// Parse a numpy type character such as `'f'` or `'l'`
    pub fn from_char(c: char) -> Result<Self> {
        let t = match c {
            '?' => ElementType::Bool,
            'b' => ElementType::Int8,
            'B' => ElementType::UInt8,
            'h' => ElementType::Int16,
            'H' => ElementType::UInt16,
            'i' => ElementType::Int32,
            'I' => ElementType::UInt32,
            'l' => ElementType::Int64,
            'L' => ElementType::UInt64,
            'q' => ElementType::LongLong,
            'Q' => ElementType::ULongLong,
            'f' => ElementType::Float32,
            'd' => ElementType::Float64,
            other => {
                return Err(ConvoyError::UnsupportedElementType {
                    type_name: other.to_string(),
                })
            }
        };
        Ok(t)
    }

    /// numpy type character
    pub fn type_char(&self) -> char {
        match self {
            ElementType::Bool => '?',
            ElementType::Int8 => 'b',
            ElementType::UInt8 => 'B',
            ElementType::Int16 => 'h',
            ElementType::UInt16 => 'H',
            ElementType::Int32 => 'i',
            ElementType::UInt32 => 'I',
            ElementType::Int64 => 'l',
            ElementType::UInt64 => 'L',
            ElementType::LongLong => 'q',
            ElementType::ULongLong => 'Q',
            ElementType::Float32 => 'f',
            ElementType::Float64 => 'd',
        }
    }

    /// Collective-layer tag for this element type
    pub fn mpi_type(&self) -> MpiType {
        match self {
            ElementType::Bool => MpiType::CBool,
            ElementType::Int8 => MpiType::SignedChar,
            ElementType::UInt8 => MpiType::UnsignedChar,
            ElementType::Int16 => MpiType::Short,
            ElementType::UInt16 => MpiType::UnsignedShort,
            ElementType::Int32 => MpiType::Int,
            ElementType::UInt32 => MpiType::Unsigned,
            ElementType::Int64 => MpiType::Long,
            ElementType::UInt64 => MpiType::UnsignedLong,
            ElementType::LongLong => MpiType::LongLong,
            ElementType::ULongLong => MpiType::UnsignedLongLong,
            ElementType::Float32 => MpiType::Float,
            ElementType::Float64 => MpiType::Double,
        }
    }
}

impl FromStr for ElementType {
    type Err = ConvoyError;

    /// Accepts a numpy type character or a dtype name like `float32`
    fn from_str(s: &str) -> Result<Self> {
        let t = match s {
            "bool" => ElementType::Bool,
            "int8" => ElementType::Int8,
            "uint8" => ElementType::UInt8,
            "int16" => ElementType::Int16,
            "uint16" => ElementType::UInt16,
            "int32" => ElementType::Int32,
            "uint32" => ElementType::UInt32,
            "int64" => ElementType::Int64,
            "uint64" => ElementType::UInt64,
            "float32" => ElementType::Float32,
            "float64" => ElementType::Float64,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => return Self::from_char(c),
                    _ => {
                        return Err(ConvoyError::UnsupportedElementType {
                            type_name: other.to_string(),
                        })
                    }
                }
            }
        };
        Ok(t)
    }
}

impl MpiType {
    /// C name of the tag
    pub fn name(&self) -> &'static str {
        match self {
            MpiType::CBool => "MPI_C_BOOL",
            MpiType::SignedChar => "MPI_SIGNED_CHAR",
            MpiType::UnsignedChar => "MPI_UNSIGNED_CHAR",
            MpiType::Short => "MPI_SHORT",
            MpiType::UnsignedShort => "MPI_UNSIGNED_SHORT",
            MpiType::Int => "MPI_INT",
            MpiType::Unsigned => "MPI_UNSIGNED",
            MpiType::Long => "MPI_LONG",
            MpiType::UnsignedLong => "MPI_UNSIGNED_LONG",
            MpiType::LongLong => "MPI_LONG_LONG",
            MpiType::UnsignedLongLong => "MPI_UNSIGNED_LONG_LONG",
            MpiType::Float => "MPI_FLOAT",
            MpiType::Double => "MPI_DOUBLE",
        }
    }
}

impl fmt::Display for MpiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalars with a fixed collective-layer element type
pub trait CommElement {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! comm_element {
    ($($t:ty => $e:ident),* $(,)?) => {
        $(impl CommElement for $t {
            const ELEMENT_TYPE: ElementType = ElementType::$e;
        })*
    };
}

comm_element! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

/// Collective-layer tag for a Rust element type
pub fn mpi_type_of<T: CommElement>() -> MpiType {
    T::ELEMENT_TYPE.mpi_type()
}

/// Collective-layer tag for a dtype string, erroring on unknown types
pub fn dtype_to_mpi(dtype: &str) -> Result<MpiType> {
    Ok(dtype.parse::<ElementType>()?.mpi_type())
}
