use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use crate::ast::types::{Record, SizedType};

/// Kernel symbol and type information.
pub trait SymbolProvider {
    /// Attachable kernel function (kprobe, fentry).
    fn has_kernel_function(&self, name: &str) -> bool;
    /// Any kernel symbol, including data.
    fn has_kernel_symbol(&self, name: &str) -> bool;
    fn has_tracepoint(&self, category: &str, event: &str) -> bool;
    /// Layout of a tracepoint's `args`.
    fn tracepoint_args(&self, category: &str, event: &str) -> Option<Rc<Record>>;
    /// Layout of an fentry/fexit function's `args`.
    fn kfunc_args(&self, func: &str) -> Option<Rc<Record>>;
    /// Return type seen by `retval` in fexit probes.
    fn kfunc_return(&self, func: &str) -> Option<SizedType>;
    fn resolve_struct(&self, name: &str) -> Option<Rc<Record>>;
    fn enum_value(&self, name: &str) -> Option<u64>;
}

/// In-memory symbol tables, filled through the builder methods.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    kernel_functions: HashSet<String>,
    kernel_symbols: HashSet<String>,
    tracepoints: HashMap<(String, String), Rc<Record>>,
    kfuncs: HashMap<String, (Rc<Record>, SizedType)>,
    structs: HashMap<String, Rc<Record>>,
    enums: HashMap<String, u64>,
}

impl StaticSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel_function(mut self, name: &str) -> Self {
        self.kernel_functions.insert(String::from(name));
        self.kernel_symbols.insert(String::from(name));
        self
    }

    pub fn with_kernel_symbol(mut self, name: &str) -> Self {
        self.kernel_symbols.insert(String::from(name));
        self
    }

    pub fn with_tracepoint(mut self, category: &str, event: &str, args: Record) -> Self {
        self.tracepoints
            .insert((String::from(category), String::from(event)), Rc::new(args));
        self
    }

    /// Registers `func` as attachable with fentry/fexit.
    pub fn with_kfunc(mut self, func: &str, args: Record, return_type: SizedType) -> Self {
        self.kfuncs
            .insert(String::from(func), (Rc::new(args), return_type));
        self.with_kernel_function(func)
    }

    pub fn with_struct(mut self, record: Record) -> Self {
        self.structs.insert(record.name.clone(), Rc::new(record));
        self
    }

    pub fn with_enum(mut self, name: &str, value: u64) -> Self {
        self.enums.insert(String::from(name), value);
        self
    }
}

impl SymbolProvider for StaticSymbols {
    fn has_kernel_function(&self, name: &str) -> bool {
        self.kernel_functions.contains(name)
    }

    fn has_kernel_symbol(&self, name: &str) -> bool {
        self.kernel_symbols.contains(name)
    }

    fn has_tracepoint(&self, category: &str, event: &str) -> bool {
        self.tracepoints
            .contains_key(&(String::from(category), String::from(event)))
    }

    fn tracepoint_args(&self, category: &str, event: &str) -> Option<Rc<Record>> {
        self.tracepoints
            .get(&(String::from(category), String::from(event)))
            .cloned()
    }

    fn kfunc_args(&self, func: &str) -> Option<Rc<Record>> {
        self.kfuncs.get(func).map(|(args, _)| Rc::clone(args))
    }

    fn kfunc_return(&self, func: &str) -> Option<SizedType> {
        self.kfuncs.get(func).map(|(_, ret)| ret.clone())
    }

    fn resolve_struct(&self, name: &str) -> Option<Rc<Record>> {
        self.structs.get(name).cloned()
    }

    fn enum_value(&self, name: &str) -> Option<u64> {
        self.enums.get(name).copied()
    }
}

/// Every symbol exists, but nothing has type information. Used when no
/// kernel data is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveSymbols;

impl SymbolProvider for PermissiveSymbols {
    fn has_kernel_function(&self, _name: &str) -> bool {
        true
    }

    fn has_kernel_symbol(&self, _name: &str) -> bool {
        true
    }

    fn has_tracepoint(&self, _category: &str, _event: &str) -> bool {
        true
    }

    fn tracepoint_args(&self, _category: &str, _event: &str) -> Option<Rc<Record>> {
        None
    }

    fn kfunc_args(&self, _func: &str) -> Option<Rc<Record>> {
        None
    }

    fn kfunc_return(&self, _func: &str) -> Option<SizedType> {
        None
    }

    fn resolve_struct(&self, _name: &str) -> Option<Rc<Record>> {
        None
    }

    fn enum_value(&self, _name: &str) -> Option<u64> {
        None
    }
}
