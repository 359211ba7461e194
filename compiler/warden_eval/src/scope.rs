//! Variable scope chain.
//!
//! A chain is a linked list of frames ([`ScopeFrame`]) sharing their tails
//! through `Rc`: every block, branch and loop entry pushes a fresh frame that
//! delegates misses to the enclosing one, and the terminal frame is usually a
//! [`HostScope`] over host data.
//!
//! # Signal flags
//!
//! Each frame carries two flags: *tilt* (a `return` produced the program
//! value) and *break* (a loop was exited early). Raising a flag sets it on the
//! frame and forwards it along the chain; clearing only touches the frame's
//! own flag, so a frame can never clear a signal some other frame raised.
//! [`ResetScope`] forces its delegate's tilt off once, at construction, and
//! afterwards only forwards a write when the delegate's flag is clear.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use warden_ir::{Name, SharedInterner, StringLookup, ValueType};
use warden_value::errors::{index_out_of_range, name_not_found, type_mismatch};
use warden_value::{EvalError, ExecMap, Key, Value};

/// Shared handle to a frame.
pub type ScopeRef = Rc<dyn ScopeFrame>;

/// A stored variable: its value and, when declared with one, its type.
#[derive(Clone, Debug)]
pub struct Variable {
    value: Value,
    ty: Option<ValueType>,
}

/// Handle to one variable, returned by resolution and declaration.
#[derive(Clone)]
pub enum VariableCell {
    Local(Rc<RefCell<Variable>>),
    Host {
        data: Rc<dyn DataContext>,
        key: Arc<str>,
    },
}

impl VariableCell {
    fn local(value: Value, ty: Option<ValueType>) -> Result<Self, EvalError> {
        check_type(ty, &value)?;
        Ok(VariableCell::Local(Rc::new(RefCell::new(Variable {
            value,
            ty,
        }))))
    }

    pub fn get(&self) -> Value {
        match self {
            VariableCell::Local(var) => var.borrow().value.clone(),
            VariableCell::Host { data, key } => data.get(key).unwrap_or_default(),
        }
    }

    /// Store `value`; typed variables reject values of other types.
    pub fn set(&self, value: Value) -> Result<(), EvalError> {
        match self {
            VariableCell::Local(var) => {
                let mut var = var.borrow_mut();
                check_type(var.ty, &value)?;
                var.value = value;
                Ok(())
            }
            VariableCell::Host { data, key } => data.set(key, value),
        }
    }

    pub fn known_type(&self) -> Option<ValueType> {
        match self {
            VariableCell::Local(var) => var.borrow().ty,
            VariableCell::Host { .. } => None,
        }
    }
}

impl fmt::Debug for VariableCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableCell::Local(var) => f.debug_tuple("Local").field(&var.borrow()).finish(),
            VariableCell::Host { key, .. } => f.debug_struct("Host").field("key", key).finish(),
        }
    }
}

fn check_type(ty: Option<ValueType>, value: &Value) -> Result<(), EvalError> {
    match ty {
        Some(ty) if !ty.is_assignable_from(value.value_type()) => {
            Err(type_mismatch(ty.name(), value.type_name()))
        }
        _ => Ok(()),
    }
}

/// Name-addressable host data a program reads and writes.
pub trait DataContext {
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, value: Value) -> Result<(), EvalError>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl DataContext for ExecMap {
    fn get(&self, name: &str) -> Option<Value> {
        let key = Key::str(name);
        self.contains_key(&key).then(|| ExecMap::get(self, &key))
    }

    /// A `Null` write keeps the name declared.
    fn set(&self, name: &str, value: Value) -> Result<(), EvalError> {
        self.insert(Key::str(name), value).map(drop)
    }

    fn contains(&self, name: &str) -> bool {
        self.contains_key(&Key::str(name))
    }
}

/// One frame of the chain.
pub trait ScopeFrame {
    /// Look `name` up in this frame only.
    fn find(&self, name: Name) -> Option<VariableCell>;

    /// The frame misses are delegated to.
    fn next(&self) -> Option<&ScopeRef>;

    fn declare(
        &self,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError>;

    fn declare_indexed(
        &self,
        slot: u32,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError>;

    fn tilt(&self) -> bool;

    fn set_tilt(&self, tilt: bool);

    fn is_break(&self) -> bool;

    fn set_break(&self, brk: bool);

    /// Resolve through the whole chain; unknown names are `NameNotFound`.
    fn resolve(&self, name: Name, names: &dyn StringLookup) -> Result<VariableCell, EvalError> {
        if let Some(cell) = self.find(name) {
            return Ok(cell);
        }
        match self.next() {
            Some(next) => next.resolve(name, names),
            None => Err(name_not_found(names.lookup(name))),
        }
    }

    /// Whether `resolve` would succeed. Never fails.
    fn is_resolvable(&self, name: Name) -> bool {
        self.find(name).is_some() || self.next().is_some_and(|next| next.is_resolvable(name))
    }
}

/// Tilt/break storage shared by the concrete frames.
#[derive(Debug, Default)]
struct Signals {
    tilt: Cell<bool>,
    brk: Cell<bool>,
}

impl Signals {
    fn set_tilt(&self, tilt: bool, next: Option<&ScopeRef>) {
        self.tilt.set(tilt);
        if let (true, Some(next)) = (tilt, next) {
            next.set_tilt(true);
        }
    }

    fn set_break(&self, brk: bool, next: Option<&ScopeRef>) {
        self.brk.set(brk);
        if let (true, Some(next)) = (brk, next) {
            next.set_break(true);
        }
    }
}

/// Frame storing variables by name.
#[derive(Default)]
pub struct MapScope {
    vars: RefCell<FxHashMap<Name, VariableCell>>,
    next: Option<ScopeRef>,
    signals: Signals,
}

impl MapScope {
    pub fn new(next: Option<ScopeRef>) -> Self {
        MapScope {
            vars: RefCell::default(),
            next,
            signals: Signals::default(),
        }
    }

    /// A chain of one empty frame.
    pub fn root() -> ScopeRef {
        Rc::new(MapScope::new(None))
    }

    /// An empty frame delegating to `next`.
    pub fn child(next: &ScopeRef) -> ScopeRef {
        Rc::new(MapScope::new(Some(Rc::clone(next))))
    }

    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.borrow().is_empty()
    }
}

impl ScopeFrame for MapScope {
    fn find(&self, name: Name) -> Option<VariableCell> {
        self.vars.borrow().get(&name).cloned()
    }

    fn next(&self) -> Option<&ScopeRef> {
        self.next.as_ref()
    }

    fn declare(
        &self,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        let cell = VariableCell::local(value, ty)?;
        self.vars.borrow_mut().insert(name, cell.clone());
        Ok(cell)
    }

    /// Map frames have no slots; the variable is declared by name.
    fn declare_indexed(
        &self,
        _slot: u32,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        self.declare(name, value, ty)
    }

    fn tilt(&self) -> bool {
        self.signals.tilt.get()
    }

    fn set_tilt(&self, tilt: bool) {
        self.signals.set_tilt(tilt, self.next.as_ref());
    }

    fn is_break(&self) -> bool {
        self.signals.brk.get()
    }

    fn set_break(&self, brk: bool) {
        self.signals.set_break(brk, self.next.as_ref());
    }
}

/// Frame storing variables in numbered slots, as compiled function bodies
/// and loop headers address them.
pub struct IndexedScope {
    slots: RefCell<SmallVec<[Option<(Name, VariableCell)>; 8]>>,
    next: Option<ScopeRef>,
    signals: Signals,
}

impl IndexedScope {
    /// A frame with `slot_count` empty slots.
    pub fn new(slot_count: usize, next: Option<ScopeRef>) -> Self {
        IndexedScope {
            slots: RefCell::new(std::iter::repeat_with(|| None).take(slot_count).collect()),
            next,
            signals: Signals::default(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }

    /// The variable in `slot`, if one was declared there.
    pub fn get_indexed(&self, slot: u32) -> Option<VariableCell> {
        let slots = self.slots.borrow();
        slots
            .get(slot as usize)
            .and_then(|entry| entry.as_ref().map(|(_, cell)| cell.clone()))
    }
}

impl ScopeFrame for IndexedScope {
    fn find(&self, name: Name) -> Option<VariableCell> {
        self.slots
            .borrow()
            .iter()
            .flatten()
            .find(|(slot_name, _)| *slot_name == name)
            .map(|(_, cell)| cell.clone())
    }

    fn next(&self) -> Option<&ScopeRef> {
        self.next.as_ref()
    }

    /// Reuses the slot already holding `name`, otherwise appends a slot.
    fn declare(
        &self,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        let cell = VariableCell::local(value, ty)?;
        let mut slots = self.slots.borrow_mut();
        match slots
            .iter_mut()
            .find(|entry| entry.as_ref().is_some_and(|(n, _)| *n == name))
        {
            Some(entry) => *entry = Some((name, cell.clone())),
            None => slots.push(Some((name, cell.clone()))),
        }
        Ok(cell)
    }

    fn declare_indexed(
        &self,
        slot: u32,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        let mut slots = self.slots.borrow_mut();
        let len = slots.len();
        let entry = slots
            .get_mut(slot as usize)
            .ok_or_else(|| index_out_of_range(i64::from(slot), len))?;
        let cell = VariableCell::local(value, ty)?;
        *entry = Some((name, cell.clone()));
        Ok(cell)
    }

    fn tilt(&self) -> bool {
        self.signals.tilt.get()
    }

    fn set_tilt(&self, tilt: bool) {
        self.signals.set_tilt(tilt, self.next.as_ref());
    }

    fn is_break(&self) -> bool {
        self.signals.brk.get()
    }

    fn set_break(&self, brk: bool) {
        self.signals.set_break(brk, self.next.as_ref());
    }
}

/// Wrapper that clears its delegate's tilt once, then refuses to overwrite a
/// flag the delegate already holds.
pub struct ResetScope {
    delegate: ScopeRef,
}

impl ResetScope {
    pub fn new(delegate: ScopeRef) -> Self {
        delegate.set_tilt(false);
        ResetScope { delegate }
    }

    pub fn wrap(delegate: ScopeRef) -> ScopeRef {
        Rc::new(ResetScope::new(delegate))
    }

    pub fn delegate(&self) -> &ScopeRef {
        &self.delegate
    }
}

impl ScopeFrame for ResetScope {
    fn find(&self, name: Name) -> Option<VariableCell> {
        self.delegate.find(name)
    }

    fn next(&self) -> Option<&ScopeRef> {
        self.delegate.next()
    }

    fn declare(
        &self,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        self.delegate.declare(name, value, ty)
    }

    fn declare_indexed(
        &self,
        slot: u32,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        self.delegate.declare_indexed(slot, name, value, ty)
    }

    fn tilt(&self) -> bool {
        self.delegate.tilt()
    }

    fn set_tilt(&self, tilt: bool) {
        if !self.delegate.tilt() {
            self.delegate.set_tilt(tilt);
        }
    }

    fn is_break(&self) -> bool {
        self.delegate.is_break()
    }

    fn set_break(&self, brk: bool) {
        if !self.delegate.is_break() {
            self.delegate.set_break(brk);
        }
    }
}

/// Terminal frame resolving names against host data.
///
/// Every name the data context knows resolves to a cell that reads and writes
/// the data directly; declarations write into the data context.
pub struct HostScope {
    data: Rc<dyn DataContext>,
    interner: SharedInterner,
    signals: Signals,
}

impl HostScope {
    pub fn new(data: Rc<dyn DataContext>, interner: SharedInterner) -> Self {
        HostScope {
            data,
            interner,
            signals: Signals::default(),
        }
    }

    /// A chain of one host frame over `data`.
    pub fn chain(data: Rc<dyn DataContext>, interner: SharedInterner) -> ScopeRef {
        Rc::new(HostScope::new(data, interner))
    }

    fn cell(&self, name: Name) -> VariableCell {
        VariableCell::Host {
            data: Rc::clone(&self.data),
            key: Arc::from(self.interner.lookup(name)),
        }
    }
}

impl ScopeFrame for HostScope {
    fn find(&self, name: Name) -> Option<VariableCell> {
        self.data
            .contains(self.interner.lookup(name))
            .then(|| self.cell(name))
    }

    fn next(&self) -> Option<&ScopeRef> {
        None
    }

    /// Host cells carry no declared type.
    fn declare(
        &self,
        name: Name,
        value: Value,
        _ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        let cell = self.cell(name);
        cell.set(value)?;
        Ok(cell)
    }

    fn declare_indexed(
        &self,
        _slot: u32,
        name: Name,
        value: Value,
        ty: Option<ValueType>,
    ) -> Result<VariableCell, EvalError> {
        self.declare(name, value, ty)
    }

    fn tilt(&self) -> bool {
        self.signals.tilt.get()
    }

    fn set_tilt(&self, tilt: bool) {
        self.signals.set_tilt(tilt, None);
    }

    fn is_break(&self) -> bool {
        self.signals.brk.get()
    }

    fn set_break(&self, brk: bool) {
        self.signals.set_break(brk, None);
    }
}
