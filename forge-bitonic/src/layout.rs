//! Element shapes and the struct layout oracle.
//!
//! A [`Shape`] describes a value the way the Metal Shading Language sees it.
//! [`MslLayout`] computes byte size and alignment with MSL's rules, which the
//! resource planner needs to budget threadgroup memory.

use crate::error::ConfigError;

/// MSL scalar types usable as (parts of) sort elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Half,
    Int,
    UInt,
    Float,
    Long,
    ULong,
}

impl Scalar {
    /// MSL spelling of the scalar.
    pub fn msl_name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::UChar => "uchar",
            Scalar::Short => "short",
            Scalar::UShort => "ushort",
            Scalar::Half => "half",
            Scalar::Int => "int",
            Scalar::UInt => "uint",
            Scalar::Float => "float",
            Scalar::Long => "long",
            Scalar::ULong => "ulong",
        }
    }

    /// Size in bytes (also the alignment).
    pub fn size(self) -> usize {
        match self {
            Scalar::Bool | Scalar::Char | Scalar::UChar => 1,
            Scalar::Short | Scalar::UShort | Scalar::Half => 2,
            Scalar::Int | Scalar::UInt | Scalar::Float => 4,
            Scalar::Long | Scalar::ULong => 8,
        }
    }
}

/// A named member of a struct shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

impl Field {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Shape of an element type as declared in MSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Scalar(Scalar),
    /// `scalarN`, N in 2..=4.
    Vector(Scalar, u8),
    /// `array<T, N>` from metal_stdlib.
    Array(Box<Shape>, usize),
    Struct { name: String, fields: Vec<Field> },
    /// Caller-declared aggregate. `body` is the full declaration text; the
    /// caller vouches for `size` and `align`.
    Opaque {
        name: String,
        body: String,
        size: usize,
        align: usize,
    },
}

impl Shape {
    pub fn vector(scalar: Scalar, width: u8) -> Self {
        Shape::Vector(scalar, width)
    }

    pub fn array(element: Shape, len: usize) -> Self {
        Shape::Array(Box::new(element), len)
    }

    /// The type name used when the shape appears in kernel source.
    pub fn msl_name(&self) -> String {
        match self {
            Shape::Scalar(s) => s.msl_name().to_string(),
            Shape::Vector(s, width) => format!("{}{}", s.msl_name(), width),
            Shape::Array(inner, len) => format!("array<{}, {}>", inner.msl_name(), len),
            Shape::Struct { name, .. } | Shape::Opaque { name, .. } => name.clone(),
        }
    }

    /// Append the aggregate declarations this shape needs, dependencies
    /// first. Declarations already present (by name) are skipped.
    pub fn collect_declarations(&self, out: &mut Vec<(String, String)>) {
        match self {
            Shape::Scalar(_) | Shape::Vector(..) => {}
            Shape::Array(inner, _) => inner.collect_declarations(out),
            Shape::Struct { name, fields } => {
                for field in fields {
                    field.shape.collect_declarations(out);
                }
                if out.iter().any(|(existing, _)| existing == name) {
                    return;
                }
                let mut body = format!("struct {} {{\n", name);
                for field in fields {
                    body.push_str(&format!("    {} {};\n", field.shape.msl_name(), field.name));
                }
                body.push_str("};\n");
                out.push((name.clone(), body));
            }
            Shape::Opaque { name, body, .. } => {
                if out.iter().any(|(existing, _)| existing == name) {
                    return;
                }
                let mut body = body.trim_end().to_string();
                body.push('\n');
                out.push((name.clone(), body));
            }
        }
    }
}

/// Byte size and alignment of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLayout {
    pub size: usize,
    pub align: usize,
}

/// Computes the memory layout of element shapes.
pub trait LayoutOracle {
    fn layout_of(&self, shape: &Shape) -> Result<TypeLayout, ConfigError>;
}

/// Layout rules of the Metal Shading Language.
#[derive(Debug, Clone, Copy, Default)]
pub struct MslLayout;

impl LayoutOracle for MslLayout {
    fn layout_of(&self, shape: &Shape) -> Result<TypeLayout, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidLayout {
            name: shape.msl_name(),
            reason: reason.to_string(),
        };

        match shape {
            Shape::Scalar(s) => Ok(TypeLayout {
                size: s.size(),
                align: s.size(),
            }),
            Shape::Vector(s, width) => {
                // 3-wide vectors occupy the storage of 4.
                let lanes = match width {
                    2 => 2,
                    3 | 4 => 4,
                    _ => return Err(invalid("vector width must be 2, 3 or 4")),
                };
                let size = s.size() * lanes;
                Ok(TypeLayout { size, align: size })
            }
            Shape::Array(inner, len) => {
                if *len == 0 {
                    return Err(invalid("array length must be non-zero"));
                }
                let inner = self.layout_of(inner)?;
                let size = inner
                    .size
                    .checked_mul(*len)
                    .ok_or_else(|| invalid("size overflows usize"))?;
                Ok(TypeLayout {
                    size,
                    align: inner.align,
                })
            }
            Shape::Struct { fields, .. } => {
                if fields.is_empty() {
                    return Err(invalid("struct has no fields"));
                }
                let mut offset = 0usize;
                let mut align = 1usize;
                for field in fields {
                    let layout = self.layout_of(&field.shape)?;
                    offset = align_up(offset, layout.align)
                        .and_then(|start| start.checked_add(layout.size))
                        .ok_or_else(|| invalid("size overflows usize"))?;
                    align = align.max(layout.align);
                }
                let size = align_up(offset, align).ok_or_else(|| invalid("size overflows usize"))?;
                Ok(TypeLayout { size, align })
            }
            Shape::Opaque { size, align, .. } => {
                if *size == 0 {
                    return Err(invalid("size must be non-zero"));
                }
                if !align.is_power_of_two() {
                    return Err(invalid("alignment must be a power of two"));
                }
                if size % align != 0 {
                    return Err(invalid("size must be a multiple of the alignment"));
                }
                Ok(TypeLayout {
                    size: *size,
                    align: *align,
                })
            }
        }
    }
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    value.div_ceil(align).checked_mul(align)
}
