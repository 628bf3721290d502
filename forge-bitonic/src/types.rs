//! Element-type descriptors and the type reifier.
//!
//! Callers describe what they sort with a [`TypeDescriptor`]: an element
//! shape plus exactly one ordering, either a strict less-than predicate or a
//! distance function mapping each element to a comparable key. [`reify`]
//! validates a descriptor and produces a [`ReifiedType`] carrying the byte
//! sizes the planner and the kernel synthesizer work from.

use crate::error::ConfigError;
use crate::layout::{Field, LayoutOracle, Scalar, Shape};

/// The shape of a sortable value as it appears in kernel source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementType {
    shape: Shape,
}

impl ElementType {
    pub fn scalar(scalar: Scalar) -> Self {
        Self::from_shape(Shape::Scalar(scalar))
    }

    pub fn vector(scalar: Scalar, width: u8) -> Self {
        Self::from_shape(Shape::vector(scalar, width))
    }

    pub fn array(element: ElementType, len: usize) -> Self {
        Self::from_shape(Shape::array(element.shape, len))
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::from_shape(Shape::Struct {
            name: name.into(),
            fields,
        })
    }

    /// A caller-declared aggregate. `body` is spliced verbatim into kernels.
    pub fn opaque(name: impl Into<String>, body: impl Into<String>, size: usize, align: usize) -> Self {
        Self::from_shape(Shape::Opaque {
            name: name.into(),
            body: body.into(),
            size,
            align,
        })
    }

    pub fn from_shape(shape: Shape) -> Self {
        Self { shape }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// MSL type name.
    pub fn name(&self) -> String {
        self.shape.msl_name()
    }

    /// Aggregate declarations required by this type, nested types first.
    /// `None` for scalars, vectors and arrays of them.
    pub fn body_definition(&self) -> Option<String> {
        let mut decls = Vec::new();
        self.shape.collect_declarations(&mut decls);
        if decls.is_empty() {
            return None;
        }
        Some(decls.into_iter().map(|(_, body)| body).collect::<Vec<_>>().join("\n"))
    }
}

/// A caller-supplied MSL function: source text and the name to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFunction {
    pub code: String,
    pub entry_point: String,
}

impl ShaderFunction {
    pub fn new(code: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// An extra buffer a distance function reads, bound at `group`.
///
/// `param_type` is the MSL parameter type, e.g. `device const float4*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryBinding {
    pub group: u32,
    pub name: String,
    pub param_type: String,
}

impl AuxiliaryBinding {
    pub fn new(group: u32, name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
            param_type: param_type.into(),
        }
    }
}

/// Maps an element to a key of `result_type`.
///
/// The MSL signature is `Key entry(Element value, aux_1, ..., aux_k)` with
/// auxiliary arguments in group order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceFunction {
    pub function: ShaderFunction,
    pub result_type: Box<TypeDescriptor>,
    pub auxiliary_bindings: Vec<AuxiliaryBinding>,
}

impl DistanceFunction {
    pub fn new(function: ShaderFunction, result_type: TypeDescriptor) -> Self {
        Self {
            function,
            result_type: Box::new(result_type),
            auxiliary_bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: AuxiliaryBinding) -> Self {
        self.auxiliary_bindings.push(binding);
        self
    }
}

/// Caller-facing element type description. Exactly one of `less_than` and
/// `distance` must be set; [`reify`] enforces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub element: ElementType,
    /// `bool entry(Element a, Element b)`, strict less-than.
    pub less_than: Option<ShaderFunction>,
    pub distance: Option<DistanceFunction>,
}

impl TypeDescriptor {
    pub fn comparable(element: ElementType, less_than: ShaderFunction) -> Self {
        Self {
            element,
            less_than: Some(less_than),
            distance: None,
        }
    }

    pub fn with_distance(element: ElementType, distance: DistanceFunction) -> Self {
        Self {
            element,
            less_than: None,
            distance: Some(distance),
        }
    }

    /// A scalar ordered by the MSL `<` operator.
    pub fn natural(scalar: Scalar) -> Self {
        let ty = scalar.msl_name();
        let entry = format!("natural_less_{}", ty);
        let code = format!(
            "inline bool {}({} a, {} b) {{ return a < b; }}\n",
            entry, ty, ty
        );
        Self::comparable(ElementType::scalar(scalar), ShaderFunction::new(code, entry))
    }
}

/// An element type with its computed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReifiedElement {
    pub element: ElementType,
    pub byte_size: usize,
    pub align: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReifiedComparable {
    pub element: ReifiedElement,
    pub less_than: ShaderFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReifiedDistance {
    pub element: ReifiedElement,
    pub distance: ShaderFunction,
    /// The key type the distance function produces.
    pub key: ReifiedComparable,
    /// Sorted by group; groups are exactly `1..=k`.
    pub auxiliary_bindings: Vec<AuxiliaryBinding>,
}

/// A validated element type, tagged by how it is ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReifiedType {
    Comparable(ReifiedComparable),
    Distance(ReifiedDistance),
}

impl ReifiedType {
    /// The element stored in the caller's data buffer.
    pub fn element(&self) -> &ReifiedElement {
        match self {
            ReifiedType::Comparable(c) => &c.element,
            ReifiedType::Distance(d) => &d.element,
        }
    }

    /// The type the sort network compares: the element itself, or the
    /// distance function's result.
    pub fn key(&self) -> &ReifiedComparable {
        match self {
            ReifiedType::Comparable(c) => c,
            ReifiedType::Distance(d) => &d.key,
        }
    }

    pub fn auxiliary_bindings(&self) -> &[AuxiliaryBinding] {
        match self {
            ReifiedType::Comparable(_) => &[],
            ReifiedType::Distance(d) => &d.auxiliary_bindings,
        }
    }

    pub fn is_distance(&self) -> bool {
        matches!(self, ReifiedType::Distance(_))
    }
}

/// Validate a descriptor and compute its layout.
pub fn reify(
    descriptor: &TypeDescriptor,
    oracle: &dyn LayoutOracle,
) -> Result<ReifiedType, ConfigError> {
    let name = descriptor.element.name();
    match (&descriptor.less_than, &descriptor.distance) {
        (None, None) => Err(ConfigError::NoOrdering(name)),
        (Some(_), Some(_)) => Err(ConfigError::AmbiguousOrdering(name)),
        (Some(less_than), None) => {
            validate_identifier(&less_than.entry_point)?;
            Ok(ReifiedType::Comparable(ReifiedComparable {
                element: reify_element(&descriptor.element, oracle)?,
                less_than: less_than.clone(),
            }))
        }
        (None, Some(distance)) => {
            validate_identifier(&distance.function.entry_point)?;
            let key = match reify(&distance.result_type, oracle)? {
                ReifiedType::Comparable(key) => key,
                ReifiedType::Distance(_) => {
                    return Err(ConfigError::DistanceResultNotComparable(name))
                }
            };
            let auxiliary_bindings = normalize_bindings(&distance.auxiliary_bindings)?;
            Ok(ReifiedType::Distance(ReifiedDistance {
                element: reify_element(&descriptor.element, oracle)?,
                distance: distance.function.clone(),
                key,
                auxiliary_bindings,
            }))
        }
    }
}

fn reify_element(
    element: &ElementType,
    oracle: &dyn LayoutOracle,
) -> Result<ReifiedElement, ConfigError> {
    validate_shape_names(element.shape())?;
    let layout = oracle.layout_of(element.shape())?;
    Ok(ReifiedElement {
        element: element.clone(),
        byte_size: layout.size,
        align: layout.align,
    })
}

fn validate_shape_names(shape: &Shape) -> Result<(), ConfigError> {
    match shape {
        Shape::Scalar(_) | Shape::Vector(..) => Ok(()),
        Shape::Array(inner, _) => validate_shape_names(inner),
        Shape::Struct { name, fields } => {
            validate_identifier(name)?;
            for field in fields {
                validate_identifier(&field.name)?;
                validate_shape_names(&field.shape)?;
            }
            Ok(())
        }
        Shape::Opaque { name, .. } => validate_identifier(name),
    }
}

fn normalize_bindings(bindings: &[AuxiliaryBinding]) -> Result<Vec<AuxiliaryBinding>, ConfigError> {
    let mut sorted = bindings.to_vec();
    sorted.sort_by_key(|b| b.group);

    for (i, binding) in sorted.iter().enumerate() {
        validate_identifier(&binding.name)?;
        if binding.group == 0 {
            return Err(ConfigError::AuxiliaryGroupZero);
        }
        let expected = i as u32 + 1;
        if binding.group != expected {
            if i > 0 && sorted[i - 1].group == binding.group {
                return Err(ConfigError::AuxiliaryGroupDuplicate(binding.group));
            }
            return Err(ConfigError::AuxiliaryGroupGap {
                expected,
                found: binding.group,
            });
        }
    }
    Ok(sorted)
}

/// ASCII letter or `_`, then letters, digits or `_`.
pub(crate) fn validate_identifier(ident: &str) -> Result<(), ConfigError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(ident.to_string()))
    }
}
