//! Type descriptors.
//!
//! Every expression carries a [`SizedType`]: a kind plus the byte size,
//! signedness and address space the analyser settled on. `Type::None` is the
//! unresolved placeholder; it must not survive a successful final pass.
//!
//! Compatibility is structural. [`unify`] merges two descriptors of the same
//! shape, widening strings, buffers and integers.

use std::{fmt::Display, mem::discriminant, rc::Rc};

/// Memory a pointer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddrSpace {
    #[default]
    None,
    Kernel,
    User,
}

impl Display for AddrSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrSpace::None => write!(f, "none"),
            AddrSpace::Kernel => write!(f, "kernel"),
            AddrSpace::User => write!(f, "user"),
        }
    }
}

/// Output format of a stack trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StackMode {
    #[default]
    Bpftrace,
    Perf,
    Raw,
}

impl StackMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bpftrace" => Some(StackMode::Bpftrace),
            "perf" => Some(StackMode::Perf),
            "raw" => Some(StackMode::Raw),
            _ => None,
        }
    }
}

impl Display for StackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackMode::Bpftrace => write!(f, "bpftrace"),
            StackMode::Perf => write!(f, "perf"),
            StackMode::Raw => write!(f, "raw"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: SizedType,
    pub offset: usize,
}

/// A struct layout. A record with no fields is a forward reference that the
/// analyser resolves through the symbol provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>,
    pub size: usize,
}

impl Record {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Record {
            name: name.into(),
            fields: vec![],
            size: 0,
        }
    }

    /// Lays `fields` out back to back.
    pub fn from_fields(name: impl Into<String>, fields: Vec<(&str, SizedType)>) -> Self {
        let mut offset = 0;
        let fields = fields
            .into_iter()
            .map(|(name, ty)| {
                let field = Field {
                    name: String::from(name),
                    offset,
                    ty,
                };
                offset += field.ty.size;
                field
            })
            .collect();

        Record {
            name: name.into(),
            fields,
            size: offset,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    None,
    Void,
    Integer,
    Pointer(Box<SizedType>),
    /// Addressable binding to an aggregate in probe context memory.
    Reference(Box<SizedType>),
    String,
    Buffer,
    Array(Box<SizedType>, usize),
    Record(Rc<Record>),
    Tuple(Vec<SizedType>),
    Inet,
    Ksym,
    Usym,
    Username,
    Timestamp,
    MacAddress,
    Stack {
        kernel: bool,
        mode: StackMode,
        limit: u32,
    },
    StackMode,
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Stats,
    Hist,
    Lhist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedType {
    pub kind: Type,
    pub size: usize,
    pub is_signed: bool,
    pub addrspace: AddrSpace,
}

impl Default for SizedType {
    fn default() -> Self {
        SizedType::none()
    }
}

impl SizedType {
    fn new(kind: Type, size: usize) -> Self {
        SizedType {
            kind,
            size,
            is_signed: false,
            addrspace: AddrSpace::None,
        }
    }

    pub fn none() -> Self {
        SizedType::new(Type::None, 0)
    }

    pub fn void() -> Self {
        SizedType::new(Type::Void, 0)
    }

    /// Integer of `bits` width.
    pub fn int(bits: usize, is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Integer, bits / 8)
        }
    }

    pub fn int64() -> Self {
        SizedType::int(64, true)
    }

    pub fn uint64() -> Self {
        SizedType::int(64, false)
    }

    pub fn uint32() -> Self {
        SizedType::int(32, false)
    }

    /// `size` includes the terminator.
    pub fn string(size: usize) -> Self {
        SizedType::new(Type::String, size)
    }

    pub fn buffer(size: usize) -> Self {
        SizedType::new(Type::Buffer, size)
    }

    pub fn pointer(pointee: SizedType, addrspace: AddrSpace) -> Self {
        SizedType {
            addrspace,
            ..SizedType::new(Type::Pointer(Box::new(pointee)), 8)
        }
    }

    pub fn reference(referent: SizedType, addrspace: AddrSpace) -> Self {
        SizedType {
            addrspace,
            ..SizedType::new(Type::Reference(Box::new(referent)), 8)
        }
    }

    pub fn array(element: SizedType, len: usize) -> Self {
        let size = element.size * len;
        SizedType::new(Type::Array(Box::new(element), len), size)
    }

    pub fn record(record: Rc<Record>) -> Self {
        let size = record.size;
        SizedType::new(Type::Record(record), size)
    }

    pub fn tuple(elements: Vec<SizedType>) -> Self {
        let size = elements.iter().map(|element| element.size).sum();
        SizedType::new(Type::Tuple(elements), size)
    }

    pub fn stack(kernel: bool, mode: StackMode, limit: u32) -> Self {
        SizedType::new(Type::Stack { kernel, mode, limit }, 8)
    }

    pub fn stack_mode() -> Self {
        SizedType::new(Type::StackMode, 0)
    }

    pub fn inet(size: usize) -> Self {
        SizedType::new(Type::Inet, size)
    }

    pub fn ksym() -> Self {
        SizedType::new(Type::Ksym, 8)
    }

    pub fn usym() -> Self {
        SizedType::new(Type::Usym, 16)
    }

    pub fn username() -> Self {
        SizedType::new(Type::Username, 8)
    }

    pub fn timestamp() -> Self {
        SizedType::new(Type::Timestamp, 16)
    }

    pub fn mac_address() -> Self {
        SizedType::new(Type::MacAddress, 6)
    }

    /// Aggregation value types. `count` is unsigned, the others follow the
    /// sign of the aggregated value.
    pub fn count() -> Self {
        SizedType::new(Type::Count, 8)
    }

    pub fn sum(is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Sum, 8)
        }
    }

    pub fn min(is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Min, 8)
        }
    }

    pub fn max(is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Max, 8)
        }
    }

    pub fn avg(is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Avg, 8)
        }
    }

    pub fn stats(is_signed: bool) -> Self {
        SizedType {
            is_signed,
            ..SizedType::new(Type::Stats, 16)
        }
    }

    pub fn hist() -> Self {
        SizedType::new(Type::Hist, 8)
    }

    pub fn lhist() -> Self {
        SizedType::new(Type::Lhist, 8)
    }

    pub fn with_addrspace(mut self, addrspace: AddrSpace) -> Self {
        self.addrspace = addrspace;
        self
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, Type::None)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, Type::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(self.kind, Type::Integer)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, Type::String)
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.kind, Type::Buffer)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, Type::Pointer(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, Type::Reference(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, Type::Array(..))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, Type::Record(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.kind, Type::Tuple(_))
    }

    pub fn is_stack(&self) -> bool {
        matches!(self.kind, Type::Stack { .. })
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            Type::Count
                | Type::Sum
                | Type::Min
                | Type::Max
                | Type::Avg
                | Type::Stats
                | Type::Hist
                | Type::Lhist
        )
    }

    /// Aggregations that read back as a single integer.
    pub fn is_int_aggregate(&self) -> bool {
        matches!(
            self.kind,
            Type::Count | Type::Sum | Type::Min | Type::Max | Type::Avg
        )
    }

    /// Integers and everything that reads as one.
    pub fn is_intlike(&self) -> bool {
        self.is_int() || self.is_int_aggregate()
    }

    /// The integer type an int-like value reads as.
    pub fn as_integer(&self) -> SizedType {
        match self.kind {
            Type::Integer => self.clone(),
            Type::Count => SizedType::uint64(),
            _ => SizedType::int(64, self.is_signed),
        }
    }

    pub fn pointee(&self) -> Option<&SizedType> {
        match &self.kind {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<(&SizedType, usize)> {
        match &self.kind {
            Type::Array(element, len) => Some((element, *len)),
            _ => None,
        }
    }

    pub fn record_ref(&self) -> Option<&Rc<Record>> {
        match &self.kind {
            Type::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn tuple_elements(&self) -> Option<&[SizedType]> {
        match &self.kind {
            Type::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// True if `self` still contains the unresolved placeholder anywhere.
    pub fn has_none(&self) -> bool {
        match &self.kind {
            Type::None => true,
            Type::Tuple(elements) => elements.iter().any(SizedType::has_none),
            Type::Array(element, _) => element.has_none(),
            _ => false,
        }
    }
}

/// True if `a` and `b` have the same kind, ignoring sizes.
pub fn is_same_type(a: &SizedType, b: &SizedType) -> bool {
    match (&a.kind, &b.kind) {
        (Type::Tuple(left), Type::Tuple(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(l, r)| is_same_type(l, r))
        }
        (Type::Record(left), Type::Record(right)) => left.name == right.name,
        (Type::Pointer(left), Type::Pointer(right)) => is_same_type(left, right),
        (Type::Array(left, n), Type::Array(right, m)) => n == m && is_same_type(left, right),
        (left, right) => discriminant(left) == discriminant(right),
    }
}

/// Merges two descriptors of the same shape.
///
/// Strings and buffers take the larger size, integers the wider width (signed
/// if either side is). Tuples and arrays unify element-wise. The unresolved
/// placeholder unifies with anything.
pub fn unify(a: &SizedType, b: &SizedType) -> Option<SizedType> {
    if a.is_none() {
        return Some(b.clone());
    }
    if b.is_none() {
        return Some(a.clone());
    }

    match (&a.kind, &b.kind) {
        (Type::Integer, Type::Integer) => Some(SizedType {
            size: a.size.max(b.size),
            is_signed: a.is_signed || b.is_signed,
            ..a.clone()
        }),
        (Type::String, Type::String) | (Type::Buffer, Type::Buffer) | (Type::Inet, Type::Inet) => {
            Some(SizedType {
                size: a.size.max(b.size),
                ..a.clone()
            })
        }
        (Type::Tuple(left), Type::Tuple(right)) => {
            if left.len() != right.len() {
                return None;
            }
            let elements = left
                .iter()
                .zip(right)
                .map(|(l, r)| unify(l, r))
                .collect::<Option<Vec<_>>>()?;
            Some(SizedType::tuple(elements))
        }
        (Type::Array(left, n), Type::Array(right, m)) if n == m => {
            Some(SizedType::array(unify(left, right)?, *n).with_addrspace(a.addrspace))
        }
        (Type::Pointer(left), Type::Pointer(right)) => {
            is_same_type(left, right).then(|| a.clone())
        }
        (Type::Record(left), Type::Record(right)) => (left.name == right.name).then(|| a.clone()),
        (
            Type::Stack {
                kernel: k1,
                mode: m1,
                limit: l1,
            },
            Type::Stack {
                kernel: k2,
                mode: m2,
                limit: l2,
            },
        ) => (k1 == k2 && m1 == m2).then(|| SizedType::stack(*k1, *m1, (*l1).max(*l2))),
        (Type::Sum, Type::Sum)
        | (Type::Min, Type::Min)
        | (Type::Max, Type::Max)
        | (Type::Avg, Type::Avg)
        | (Type::Stats, Type::Stats) => Some(SizedType {
            is_signed: a.is_signed || b.is_signed,
            ..a.clone()
        }),
        (left, right) if discriminant(left) == discriminant(right) => Some(a.clone()),
        _ => None,
    }
}

impl Display for SizedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Type::None => write!(f, "none"),
            Type::Void => write!(f, "void"),
            Type::Integer => {
                let prefix = if self.is_signed { "int" } else { "uint" };
                write!(f, "{}{}", prefix, self.size * 8)
            }
            Type::Pointer(pointee) => write!(f, "{} *", pointee),
            Type::Reference(referent) => write!(f, "{} &", referent),
            Type::String => write!(f, "string[{}]", self.size),
            Type::Buffer => write!(f, "buffer[{}]", self.size),
            Type::Array(element, len) => write!(f, "{}[{}]", element, len),
            Type::Record(record) => write!(f, "struct {}", record.name),
            Type::Tuple(elements) => {
                let names = elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>();
                write!(f, "({})", names.join(","))
            }
            Type::Inet => write!(f, "inet[{}]", self.size),
            Type::Ksym => write!(f, "ksym_t"),
            Type::Usym => write!(f, "usym_t"),
            Type::Username => write!(f, "username"),
            Type::Timestamp => write!(f, "timestamp"),
            Type::MacAddress => write!(f, "mac_address"),
            Type::Stack { kernel, .. } => {
                write!(f, "{}", if *kernel { "kstack" } else { "ustack" })
            }
            Type::StackMode => write!(f, "stack_mode"),
            Type::Count => write!(f, "count_t"),
            Type::Sum => write!(f, "sum_t"),
            Type::Min => write!(f, "min_t"),
            Type::Max => write!(f, "max_t"),
            Type::Avg => write!(f, "avg_t"),
            Type::Stats => write!(f, "stats_t"),
            Type::Hist => write!(f, "hist_t"),
            Type::Lhist => write!(f, "lhist_t"),
        }
    }
}

/// Ordered key of a map; empty for scalar maps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapKey {
    pub args: Vec<SizedType>,
}

impl MapKey {
    pub fn new(args: Vec<SizedType>) -> Self {
        MapKey { args }
    }

    pub fn is_scalar(&self) -> bool {
        self.args.is_empty()
    }

    /// The type a `for` loop sees for this key.
    pub fn as_loop_type(&self) -> SizedType {
        match self.args.as_slice() {
            [single] => single.clone(),
            args => SizedType::tuple(args.to_vec()),
        }
    }
}

impl Display for MapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>();
        write!(f, "[{}]", names.join(", "))
    }
}
