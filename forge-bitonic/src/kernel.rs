//! Metal Shading Language source generation for sort sessions.
//!
//! Three kernels are produced per session: the bitonic sort kernel (one
//! pipeline serving every pass, selected at dispatch time by `PassParams`),
//! the distance-mapping kernel and the index-initialization kernel. All
//! generators are pure functions of their inputs, so the emitted text can be
//! tested without a device.

use std::fmt;
use std::str::FromStr;

use crate::planner::SortPlan;
use crate::schedule::Phase;
use crate::types::{ElementType, ReifiedComparable, ReifiedDistance, ReifiedElement};

pub const SORT_ENTRY_POINT: &str = "bitonic_sort";
pub const DISTANCE_ENTRY_POINT: &str = "bitonic_distance_map";
pub const INIT_ENTRY_POINT: &str = "bitonic_init_indices";

/// Buffer slots of the sort kernel.
pub const SORT_KEYS_SLOT: usize = 0;
pub const SORT_PAYLOAD_SLOT: usize = 1;
pub const SORT_PARAMS_SLOT: usize = 2;

/// Buffer slots of the distance-mapping kernel. Auxiliary group `g` is bound
/// at `DISTANCE_INDICES_SLOT + g`.
pub const DISTANCE_DATA_SLOT: usize = 0;
pub const DISTANCE_KEYS_SLOT: usize = 1;
pub const DISTANCE_INDICES_SLOT: usize = 2;

pub const INIT_INDICES_SLOT: usize = 0;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "asc"),
            SortOrder::Descending => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{}': use asc or desc", other)),
        }
    }
}

/// What travels with the keys during the sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Keys only.
    Direct,
    /// A payload array swapped together with the keys.
    KeyValue(ReifiedElement),
    /// Keys are read through an index array; only the indices move.
    Indirect,
}

impl PayloadLayout {
    /// Threadgroup memory staged per item.
    pub fn per_item_bytes(&self, key_bytes: usize) -> usize {
        match self {
            PayloadLayout::Direct => key_bytes,
            PayloadLayout::KeyValue(value) => key_bytes.saturating_add(value.byte_size),
            PayloadLayout::Indirect => key_bytes.saturating_add(4),
        }
    }

    /// MSL type staged next to the keys in threadgroup memory, if any.
    fn local_payload_type(&self) -> Option<&'static str> {
        match self {
            PayloadLayout::Direct => None,
            PayloadLayout::KeyValue(_) => Some("sort_value_t"),
            PayloadLayout::Indirect => Some("uint"),
        }
    }
}

/// Generated kernel text and the function to build a pipeline from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    pub entry_point: &'static str,
    pub source: String,
}

/// Generate the sort kernel for a non-trivial plan.
pub fn sort_kernel(
    key: &ReifiedComparable,
    payload: &PayloadLayout,
    order: SortOrder,
    plan: &SortPlan,
) -> KernelSource {
    let mut src = String::with_capacity(8192);

    emit_header(&mut src, plan.n);
    emit_sort_constants(&mut src, plan);

    let mut types = vec![&key.element.element];
    if let PayloadLayout::KeyValue(value) = payload {
        types.push(&value.element);
    }
    emit_type_declarations(&mut src, &types);

    emit_caller_function(&mut src, "less-than predicate", &key.less_than.code);

    src.push_str(&format!("typedef {} sort_key_t;\n", key.element.element.name()));
    if let PayloadLayout::KeyValue(value) = payload {
        src.push_str(&format!("typedef {} sort_value_t;\n", value.element.name()));
    }
    src.push('\n');

    emit_ordering(&mut src, &key.less_than.entry_point, order);
    emit_pairing(&mut src);
    emit_global_compare_swap(&mut src, payload);
    emit_local_compare_swap(&mut src, payload);
    emit_sort_body(&mut src, payload);

    KernelSource {
        entry_point: SORT_ENTRY_POINT,
        source: src,
    }
}

/// Generate the distance-mapping kernel. With `with_indices` the kernel also
/// writes the identity permutation.
pub fn distance_kernel(distance: &ReifiedDistance, with_indices: bool, n: usize) -> KernelSource {
    let mut src = String::with_capacity(4096);

    emit_header(&mut src, n);
    emit_type_declarations(
        &mut src,
        &[&distance.element.element, &distance.key.element.element],
    );
    emit_caller_function(&mut src, "distance function", &distance.distance.code);

    src.push_str(&format!("kernel void {}(\n", DISTANCE_ENTRY_POINT));
    src.push_str(&format!(
        "    device const {}* data [[buffer({})]],\n",
        distance.element.element.name(),
        DISTANCE_DATA_SLOT
    ));
    src.push_str(&format!(
        "    device {}* keys [[buffer({})]],\n",
        distance.key.element.element.name(),
        DISTANCE_KEYS_SLOT
    ));
    if with_indices {
        src.push_str(&format!(
            "    device uint* indices [[buffer({})]],\n",
            DISTANCE_INDICES_SLOT
        ));
    }
    for binding in &distance.auxiliary_bindings {
        src.push_str(&format!(
            "    {} {} [[buffer({})]],\n",
            binding.param_type,
            binding.name,
            DISTANCE_INDICES_SLOT + binding.group as usize
        ));
    }
    src.push_str("    uint gid [[thread_position_in_grid]])\n{\n");
    src.push_str("    if (gid >= ELEMENT_COUNT) return;\n");

    let mut args = vec!["data[gid]".to_string()];
    args.extend(distance.auxiliary_bindings.iter().map(|b| b.name.clone()));
    src.push_str(&format!(
        "    keys[gid] = {}({});\n",
        distance.distance.entry_point,
        args.join(", ")
    ));
    if with_indices {
        src.push_str("    indices[gid] = gid;\n");
    }
    src.push_str("}\n");

    KernelSource {
        entry_point: DISTANCE_ENTRY_POINT,
        source: src,
    }
}

/// Generate the kernel that writes `[0, n)` into the index buffer.
pub fn init_indices_kernel(n: usize) -> KernelSource {
    let mut src = String::with_capacity(512);
    emit_header(&mut src, n);
    src.push_str(&format!(
        "kernel void {}(\n    device uint* indices [[buffer({})]],\n    uint gid [[thread_position_in_grid]])\n{{\n",
        INIT_ENTRY_POINT, INIT_INDICES_SLOT
    ));
    src.push_str("    if (gid >= ELEMENT_COUNT) return;\n");
    src.push_str("    indices[gid] = gid;\n}\n");
    KernelSource {
        entry_point: INIT_ENTRY_POINT,
        source: src,
    }
}

// ---------------------------------------------------------------------------
// Code emission helpers
// ---------------------------------------------------------------------------

fn emit_header(src: &mut String, n: usize) {
    src.push_str("#include <metal_stdlib>\nusing namespace metal;\n\n");
    src.push_str(&format!("constant uint ELEMENT_COUNT = {}u;\n", n));
}

fn emit_sort_constants(src: &mut String, plan: &SortPlan) {
    let workgroup_size = plan.workgroup_size.max(1);
    src.push_str(&format!("constant uint WORKGROUP_SIZE = {}u;\n", workgroup_size));
    src.push_str(&format!("#define BLOCK_SIZE {}u\n\n", workgroup_size * 2));

    for phase in [
        Phase::LocalBms,
        Phase::LocalDisperse,
        Phase::GlobalFlip,
        Phase::GlobalDisperse,
    ] {
        src.push_str(&format!("#define {} {}u\n", phase_macro(phase), phase.id()));
    }
    src.push('\n');

    src.push_str("struct PassParams {\n    uint h;\n    uint phase;\n    uint pad0;\n    uint pad1;\n};\n\n");
}

fn phase_macro(phase: Phase) -> &'static str {
    match phase {
        Phase::LocalBms => "PHASE_LOCAL_BMS",
        Phase::LocalDisperse => "PHASE_LOCAL_DISPERSE",
        Phase::GlobalFlip => "PHASE_GLOBAL_FLIP",
        Phase::GlobalDisperse => "PHASE_GLOBAL_DISPERSE",
    }
}

fn emit_type_declarations(src: &mut String, types: &[&ElementType]) {
    let mut decls = Vec::new();
    for ty in types {
        ty.shape().collect_declarations(&mut decls);
    }
    if decls.is_empty() {
        src.push('\n');
        return;
    }
    src.push_str("\n// --- Element types ---\n\n");
    for (_, body) in decls {
        src.push_str(&body);
        src.push('\n');
    }
}

fn emit_caller_function(src: &mut String, what: &str, code: &str) {
    src.push_str(&format!("// --- Caller {} ---\n\n", what));
    src.push_str(code.trim_end());
    src.push_str("\n\n");
}

/// Descending order swaps the predicate's arguments, keeping it strict.
fn emit_ordering(src: &mut String, less_than: &str, order: SortOrder) {
    let (a, b) = match order {
        SortOrder::Ascending => ("a", "b"),
        SortOrder::Descending => ("b", "a"),
    };
    src.push_str(&format!("// order: {}\n", order));
    src.push_str("inline bool ordered_before(sort_key_t a, sort_key_t b) {\n");
    src.push_str(&format!("    return {}({}, {});\n}}\n\n", less_than, a, b));
}

fn emit_pairing(src: &mut String) {
    src.push_str(
        r#"inline uint2 flip_pair(uint h, uint t) {
    uint half_h = h >> 1;
    uint q = ((2 * t) / h) * h;
    uint r = t % half_h;
    return uint2(q + r, q + h - r - 1);
}

inline uint2 disperse_pair(uint h, uint t) {
    uint half_h = h >> 1;
    uint q = ((2 * t) / h) * h;
    uint x = q + t % half_h;
    return uint2(x, x + half_h);
}

"#,
    );
}

fn emit_global_compare_swap(src: &mut String, payload: &PayloadLayout) {
    // x < y for both pairings, so bounding y bounds the pair.
    match payload {
        PayloadLayout::Direct => src.push_str(
            r#"inline void global_compare_swap(device sort_key_t* keys, uint2 p) {
    if (p.y >= ELEMENT_COUNT) return;
    sort_key_t a = keys[p.x];
    sort_key_t b = keys[p.y];
    if (ordered_before(b, a)) {
        keys[p.x] = b;
        keys[p.y] = a;
    }
}

"#,
        ),
        PayloadLayout::KeyValue(_) => src.push_str(
            r#"inline void global_compare_swap(device sort_key_t* keys, device sort_value_t* values, uint2 p) {
    if (p.y >= ELEMENT_COUNT) return;
    sort_key_t a = keys[p.x];
    sort_key_t b = keys[p.y];
    if (ordered_before(b, a)) {
        keys[p.x] = b;
        keys[p.y] = a;
        sort_value_t v = values[p.x];
        values[p.x] = values[p.y];
        values[p.y] = v;
    }
}

"#,
        ),
        PayloadLayout::Indirect => src.push_str(
            r#"inline void global_compare_swap(device const sort_key_t* keys, device uint* indices, uint2 p) {
    if (p.y >= ELEMENT_COUNT) return;
    uint ix = indices[p.x];
    uint iy = indices[p.y];
    if (ordered_before(keys[iy], keys[ix])) {
        indices[p.x] = iy;
        indices[p.y] = ix;
    }
}

"#,
        ),
    }
}

fn emit_local_compare_swap(src: &mut String, payload: &PayloadLayout) {
    let payload_type = payload.local_payload_type();
    src.push_str("inline void local_compare_swap(threadgroup sort_key_t* keys, ");
    if let Some(ty) = payload_type {
        src.push_str(&format!("threadgroup {}* payload, ", ty));
    }
    src.push_str("uint2 p, uint limit) {\n");
    src.push_str("    if (p.y >= limit) return;\n");
    src.push_str("    sort_key_t a = keys[p.x];\n    sort_key_t b = keys[p.y];\n");
    src.push_str("    if (ordered_before(b, a)) {\n        keys[p.x] = b;\n        keys[p.y] = a;\n");
    if let Some(ty) = payload_type {
        src.push_str(&format!(
            "        {} v = payload[p.x];\n        payload[p.x] = payload[p.y];\n        payload[p.y] = v;\n",
            ty
        ));
    }
    src.push_str("    }\n}\n\n");
}

fn emit_sort_body(src: &mut String, payload: &PayloadLayout) {
    src.push_str(&format!("kernel void {}(\n", SORT_ENTRY_POINT));
    match payload {
        PayloadLayout::Direct => {
            src.push_str(&format!(
                "    device sort_key_t* keys [[buffer({})]],\n",
                SORT_KEYS_SLOT
            ));
        }
        PayloadLayout::KeyValue(_) => {
            src.push_str(&format!(
                "    device sort_key_t* keys [[buffer({})]],\n",
                SORT_KEYS_SLOT
            ));
            src.push_str(&format!(
                "    device sort_value_t* values [[buffer({})]],\n",
                SORT_PAYLOAD_SLOT
            ));
        }
        PayloadLayout::Indirect => {
            src.push_str(&format!(
                "    device const sort_key_t* keys [[buffer({})]],\n",
                SORT_KEYS_SLOT
            ));
            src.push_str(&format!(
                "    device uint* indices [[buffer({})]],\n",
                SORT_PAYLOAD_SLOT
            ));
        }
    }
    src.push_str(&format!(
        "    constant PassParams& params [[buffer({})]],\n",
        SORT_PARAMS_SLOT
    ));
    src.push_str("    uint gid [[thread_position_in_grid]],\n");
    src.push_str("    uint lid [[thread_position_in_threadgroup]],\n");
    src.push_str("    uint group [[threadgroup_position_in_grid]])\n{\n");

    // --- Global phases: compare-and-swap directly on the buffer ---
    let global_args = match payload {
        PayloadLayout::Direct => "keys",
        PayloadLayout::KeyValue(_) => "keys, values",
        PayloadLayout::Indirect => "keys, indices",
    };
    src.push_str("    if (params.phase == PHASE_GLOBAL_FLIP) {\n");
    src.push_str(&format!(
        "        global_compare_swap({}, flip_pair(params.h, gid));\n        return;\n    }}\n",
        global_args
    ));
    src.push_str("    if (params.phase == PHASE_GLOBAL_DISPERSE) {\n");
    src.push_str(&format!(
        "        global_compare_swap({}, disperse_pair(params.h, gid));\n        return;\n    }}\n\n",
        global_args
    ));

    // --- Local phases: stage the block in threadgroup memory ---
    src.push_str("    threadgroup sort_key_t local_keys[BLOCK_SIZE];\n");
    if let Some(ty) = payload.local_payload_type() {
        src.push_str(&format!("    threadgroup {} local_payload[BLOCK_SIZE];\n", ty));
    }
    src.push_str("    uint offset = group * BLOCK_SIZE;\n");
    src.push_str("    uint limit = offset < ELEMENT_COUNT ? ELEMENT_COUNT - offset : 0;\n\n");

    src.push_str("    for (uint i = lid; i < BLOCK_SIZE && i < limit; i += WORKGROUP_SIZE) {\n");
    match payload {
        PayloadLayout::Direct => {
            src.push_str("        local_keys[i] = keys[offset + i];\n");
        }
        PayloadLayout::KeyValue(_) => {
            src.push_str("        local_keys[i] = keys[offset + i];\n");
            src.push_str("        local_payload[i] = values[offset + i];\n");
        }
        PayloadLayout::Indirect => {
            src.push_str("        uint index = indices[offset + i];\n");
            src.push_str("        local_payload[i] = index;\n");
            src.push_str("        local_keys[i] = keys[index];\n");
        }
    }
    src.push_str("    }\n");
    src.push_str("    threadgroup_barrier(mem_flags::mem_threadgroup);\n\n");

    let local_args = if payload.local_payload_type().is_some() {
        "local_keys, local_payload"
    } else {
        "local_keys"
    };
    src.push_str("    if (params.phase == PHASE_LOCAL_BMS) {\n");
    src.push_str("        for (uint k = 2; k <= params.h; k <<= 1) {\n");
    src.push_str(&format!(
        "            local_compare_swap({}, flip_pair(k, lid), limit);\n",
        local_args
    ));
    src.push_str("            threadgroup_barrier(mem_flags::mem_threadgroup);\n");
    src.push_str("            for (uint kk = k >> 1; kk > 1; kk >>= 1) {\n");
    src.push_str(&format!(
        "                local_compare_swap({}, disperse_pair(kk, lid), limit);\n",
        local_args
    ));
    src.push_str("                threadgroup_barrier(mem_flags::mem_threadgroup);\n");
    src.push_str("            }\n        }\n    } else {\n");
    src.push_str(&format!(
        "        local_compare_swap({}, disperse_pair(params.h, lid), limit);\n",
        local_args
    ));
    src.push_str("        threadgroup_barrier(mem_flags::mem_threadgroup);\n    }\n\n");

    src.push_str("    for (uint i = lid; i < BLOCK_SIZE && i < limit; i += WORKGROUP_SIZE) {\n");
    match payload {
        PayloadLayout::Direct => {
            src.push_str("        keys[offset + i] = local_keys[i];\n");
        }
        PayloadLayout::KeyValue(_) => {
            src.push_str("        keys[offset + i] = local_keys[i];\n");
            src.push_str("        values[offset + i] = local_payload[i];\n");
        }
        PayloadLayout::Indirect => {
            src.push_str("        indices[offset + i] = local_payload[i];\n");
        }
    }
    src.push_str("    }\n}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Field, MslLayout, Scalar, Shape};
    use crate::planner::{plan, DeviceLimits};
    use crate::types::{
        reify, AuxiliaryBinding, DistanceFunction, ReifiedType, ShaderFunction, TypeDescriptor,
    };

    fn limits() -> DeviceLimits {
        DeviceLimits::new(256, 32768)
    }

    fn uint_key() -> ReifiedComparable {
        match reify(&TypeDescriptor::natural(Scalar::UInt), &MslLayout).unwrap() {
            ReifiedType::Comparable(c) => c,
            ReifiedType::Distance(_) => unreachable!(),
        }
    }

    fn color_distance(bindings: Vec<AuxiliaryBinding>) -> ReifiedDistance {
        let mut distance = DistanceFunction::new(
            ShaderFunction::new(
                "float brightness(Color c) { return c.rgb.x + c.rgb.y + c.rgb.z; }",
                "brightness",
            ),
            TypeDescriptor::natural(Scalar::Float),
        );
        for b in bindings {
            distance = distance.with_binding(b);
        }
        let desc = TypeDescriptor::with_distance(
            ElementType::structure(
                "Color",
                vec![Field::new("rgb", Shape::vector(Scalar::Float, 3))],
            ),
            distance,
        );
        match reify(&desc, &MslLayout).unwrap() {
            ReifiedType::Distance(d) => d,
            ReifiedType::Comparable(_) => unreachable!(),
        }
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert!("up".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::Descending.to_string(), "desc");
    }

    #[test]
    fn test_per_item_bytes() {
        let value = uint_key().element;
        assert_eq!(PayloadLayout::Direct.per_item_bytes(16), 16);
        assert_eq!(PayloadLayout::KeyValue(value).per_item_bytes(16), 20);
        assert_eq!(PayloadLayout::Indirect.per_item_bytes(8), 12);
        assert_eq!(PayloadLayout::Indirect.per_item_bytes(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_sort_kernel_direct() {
        let p = plan(1000, 4, limits()).unwrap();
        let k = sort_kernel(&uint_key(), &PayloadLayout::Direct, SortOrder::Ascending, &p);
        assert_eq!(k.entry_point, "bitonic_sort");
        let src = &k.source;
        assert!(src.starts_with("#include <metal_stdlib>"));
        assert!(src.contains("constant uint ELEMENT_COUNT = 1000u;"));
        assert!(src.contains("constant uint WORKGROUP_SIZE = 256u;"));
        assert!(src.contains("#define BLOCK_SIZE 512u"));
        assert!(src.contains("#define PHASE_GLOBAL_DISPERSE 3u"));
        assert!(src.contains("typedef uint sort_key_t;"));
        assert!(src.contains("inline bool natural_less_uint(uint a, uint b)"));
        assert!(src.contains("return natural_less_uint(a, b);"));
        assert!(src.contains("device sort_key_t* keys [[buffer(0)]]"));
        assert!(src.contains("constant PassParams& params [[buffer(2)]]"));
        // No payload means no payload code.
        assert!(!src.contains("sort_value_t"));
        assert!(!src.contains("local_payload"));
        assert!(!src.contains("indices"));
    }

    #[test]
    fn test_descending_swaps_arguments() {
        let p = plan(64, 4, limits()).unwrap();
        let k = sort_kernel(&uint_key(), &PayloadLayout::Direct, SortOrder::Descending, &p);
        assert!(k.source.contains("return natural_less_uint(b, a);"));
        assert!(k.source.contains("// order: desc"));
    }

    #[test]
    fn test_sort_kernel_key_value() {
        let distance = color_distance(vec![]);
        let payload = PayloadLayout::KeyValue(distance.element.clone());
        let p = plan(100, payload.per_item_bytes(4), limits()).unwrap();
        let k = sort_kernel(&distance.key, &payload, SortOrder::Ascending, &p);
        let src = &k.source;
        assert!(src.contains("struct Color {\n    float3 rgb;\n};"));
        assert!(src.contains("typedef float sort_key_t;"));
        assert!(src.contains("typedef Color sort_value_t;"));
        assert!(src.contains("device sort_value_t* values [[buffer(1)]]"));
        assert!(src.contains("threadgroup sort_value_t local_payload[BLOCK_SIZE];"));
        assert!(src.contains("values[offset + i] = local_payload[i];"));
    }

    #[test]
    fn test_sort_kernel_indirect() {
        let p = plan(100, PayloadLayout::Indirect.per_item_bytes(4), limits()).unwrap();
        let k = sort_kernel(&uint_key(), &PayloadLayout::Indirect, SortOrder::Ascending, &p);
        let src = &k.source;
        assert!(src.contains("device const sort_key_t* keys [[buffer(0)]]"));
        assert!(src.contains("device uint* indices [[buffer(1)]]"));
        assert!(src.contains("ordered_before(keys[iy], keys[ix])"));
        assert!(src.contains("local_keys[i] = keys[index];"));
        assert!(src.contains("indices[offset + i] = local_payload[i];"));
        // Keys are never written back.
        assert!(!src.contains("keys[offset + i] = local_keys[i];"));
    }

    #[test]
    fn test_local_stages_are_barriered() {
        let p = plan(4096, 4, limits()).unwrap();
        let k = sort_kernel(&uint_key(), &PayloadLayout::Direct, SortOrder::Ascending, &p);
        let barriers = k
            .source
            .matches("threadgroup_barrier(mem_flags::mem_threadgroup);")
            .count();
        // After staging, after each flip, after each disperse, after a single disperse.
        assert_eq!(barriers, 4);
    }

    #[test]
    fn test_distance_kernel_in_place() {
        let distance = color_distance(vec![]);
        let k = distance_kernel(&distance, false, 300);
        assert_eq!(k.entry_point, "bitonic_distance_map");
        let src = &k.source;
        assert!(src.contains("constant uint ELEMENT_COUNT = 300u;"));
        assert!(src.contains("device const Color* data [[buffer(0)]]"));
        assert!(src.contains("device float* keys [[buffer(1)]]"));
        assert!(src.contains("keys[gid] = brightness(data[gid]);"));
        assert!(!src.contains("indices"));
    }

    #[test]
    fn test_distance_kernel_with_indices_and_bindings() {
        let distance = color_distance(vec![
            AuxiliaryBinding::new(2, "bias", "constant float&"),
            AuxiliaryBinding::new(1, "weights", "device const float3*"),
        ]);
        let k = distance_kernel(&distance, true, 10);
        let src = &k.source;
        assert!(src.contains("device uint* indices [[buffer(2)]]"));
        assert!(src.contains("device const float3* weights [[buffer(3)]]"));
        assert!(src.contains("constant float& bias [[buffer(4)]]"));
        assert!(src.contains("keys[gid] = brightness(data[gid], weights, bias);"));
        assert!(src.contains("indices[gid] = gid;"));
    }

    #[test]
    fn test_init_kernel() {
        let k = init_indices_kernel(1);
        assert_eq!(k.entry_point, "bitonic_init_indices");
        assert!(k.source.contains("constant uint ELEMENT_COUNT = 1u;"));
        assert!(k.source.contains("device uint* indices [[buffer(0)]]"));
        assert!(k.source.contains("indices[gid] = gid;"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let p = plan(777, 4, limits()).unwrap();
        let a = sort_kernel(&uint_key(), &PayloadLayout::Indirect, SortOrder::Descending, &p);
        let b = sort_kernel(&uint_key(), &PayloadLayout::Indirect, SortOrder::Descending, &p);
        assert_eq!(a, b);
        let c = sort_kernel(&uint_key(), &PayloadLayout::Direct, SortOrder::Descending, &p);
        assert_ne!(a.source, c.source);
    }
}
