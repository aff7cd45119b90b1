//! Values produced by resolving declarations and expressions.
use super::{DeclRef, Env, ExprPool, ExprRef, IntrinsicStruct};
use element_utils::Id;
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// The identity two values are compared by when matching a struct
/// constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeIdentity {
    /// Instances of a plain struct, identified by its declaration.
    Declared(DeclRef),
    /// Values of a host-implemented struct, identified by the implementation
    /// so that literals and constructed values agree.
    Intrinsic(IntrinsicStruct),
}

/// A function, possibly with leading arguments already bound.
pub struct FunctionValue {
    pub decl: DeclRef,
    /// Environment the function was declared in.
    pub env: Rc<Env>,
    /// Arguments supplied ahead of the call, e.g. the instance of an
    /// instance function.
    pub bound: Vec<Value>,
}

impl std::fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionValue")
            .field("decl", &self.decl)
            .field("bound", &self.bound)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Num(ExprRef),
    Bool(ExprRef),
    Instance(Rc<StructInstance>),
    Struct(DeclRef),
    Function(Rc<FunctionValue>),
    Namespace(DeclRef),
    Constraint(DeclRef),
    /// Sentinel produced after a diagnostic has been reported. It satisfies
    /// every constraint so one mistake is reported once.
    Error,
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error)
    }

    /// The graph node of a numeric or boolean value.
    pub fn expr(&self) -> Option<ExprRef> {
        match self {
            Value::Num(e) | Value::Bool(e) => Some(*e),
            _ => None,
        }
    }

    /// Whether `self` and `other` are the same value: the same graph node,
    /// declaration or captured function, or instances of the same struct
    /// with the same fields. Graph nodes are hash-consed, so equal handles
    /// are equal expressions.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) | (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.declaring == b.declaring
                        && a.fields.len() == b.fields.len()
                        && a.fields.iter().zip(b.fields.iter()).all(
                            |((na, va), (nb, vb))| na == nb && va.same_as(vb),
                        ))
            }
            (Value::Function(a), Value::Function(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.decl == b.decl
                        && Rc::ptr_eq(&a.env, &b.env)
                        && same_values(&a.bound, &b.bound))
            }
            (Value::Struct(a), Value::Struct(b))
            | (Value::Namespace(a), Value::Namespace(b))
            | (Value::Constraint(a), Value::Constraint(b)) => a == b,
            (Value::Error, Value::Error) => true,
            _ => false,
        }
    }

    /// All graph nodes making up this value, in field order. `None` when
    /// the value is not made of numbers.
    pub fn flatten(&self) -> Option<Vec<ExprRef>> {
        let mut out = Vec::new();
        self.flatten_into(&mut out).then_some(out)
    }

    fn flatten_into(&self, out: &mut Vec<ExprRef>) -> bool {
        match self {
            Value::Num(e) | Value::Bool(e) => {
                out.push(*e);
                true
            }
            Value::Instance(inst) => {
                inst.fields.values().all(|field| field.flatten_into(out))
            }
            _ => false,
        }
    }

    /// A value of the same shape as `self` whose leaves are taken from
    /// `leaves` in field order. Leaves that run out are left unchanged.
    pub fn with_leaves<I>(&self, leaves: &mut I, pool: &ExprPool) -> Value
    where
        I: Iterator<Item = ExprRef>,
    {
        match self {
            Value::Num(e) => Value::Num(leaves.next().unwrap_or(*e)),
            Value::Bool(e) => Value::Bool(leaves.next().unwrap_or(*e)),
            Value::Instance(inst) => {
                let fields = inst
                    .fields
                    .iter()
                    .map(|(name, field)| (*name, field.with_leaves(leaves, pool)))
                    .collect();
                Value::Instance(Rc::new(StructInstance::new(
                    inst.declaring,
                    fields,
                    pool,
                )))
            }
            other => other.clone(),
        }
    }

    /// Size of the flat representation, `None` when not serializable.
    pub fn serialized_size(&self, pool: &ExprPool) -> Option<usize> {
        match self {
            Value::Num(e) | Value::Bool(e) => pool.as_constant(*e).map(|_| 1),
            Value::Instance(inst) => {
                inst.is_serializable().then_some(inst.serialized_size())
            }
            _ => None,
        }
    }

    /// Write the flat representation into `buffer` at `position`, growing
    /// the buffer when it is too short, and advance `position`.
    pub fn serialize(
        &self,
        pool: &ExprPool,
        buffer: &mut Vec<f32>,
        position: &mut usize,
    ) -> bool {
        match self {
            Value::Num(e) | Value::Bool(e) => match pool.as_constant(*e) {
                Some(value) => {
                    if buffer.len() <= *position {
                        buffer.resize(*position + 1, 0.0);
                    }
                    buffer[*position] = value;
                    *position += 1;
                    true
                }
                None => false,
            },
            Value::Instance(inst) => inst.serialize(pool, buffer, position),
            _ => false,
        }
    }
}

/// A value built by calling a struct. Immutable once constructed.
#[derive(Debug)]
pub struct StructInstance {
    declaring: DeclRef,
    fields: LinkedHashMap<Id, Value>,
    serializable: bool,
    serialized_size: usize,
}

impl StructInstance {
    /// `fields` must be in port declaration order.
    pub fn new(
        declaring: DeclRef,
        fields: LinkedHashMap<Id, Value>,
        pool: &ExprPool,
    ) -> Self {
        let mut serializable = true;
        let mut serialized_size = 0;
        for field in fields.values() {
            match field.serialized_size(pool) {
                Some(size) => serialized_size += size,
                None => {
                    serializable = false;
                    break;
                }
            }
        }
        Self {
            declaring,
            fields,
            serializable,
            serialized_size,
        }
    }

    /// The struct this instance was constructed through.
    pub fn declaring(&self) -> DeclRef {
        self.declaring
    }

    pub fn get(&self, name: Id) -> Option<&Value> {
        self.fields.get(&name)
    }

    pub fn fields(&self) -> &LinkedHashMap<Id, Value> {
        &self.fields
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    pub fn serialized_size(&self) -> usize {
        self.serialized_size
    }

    pub fn serialize(
        &self,
        pool: &ExprPool,
        buffer: &mut Vec<f32>,
        position: &mut usize,
    ) -> bool {
        if !self.serializable {
            return false;
        }
        for field in self.fields.values() {
            field.serialize(pool, buffer, position);
        }
        true
    }
}

/// Pairwise [Value::same_as].
pub(crate) fn same_values(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_as(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(pool: &mut ExprPool, values: &[Option<f32>]) -> StructInstance {
        let mut fields = LinkedHashMap::new();
        for (idx, v) in values.iter().enumerate() {
            let expr = match v {
                Some(c) => pool.constant(*c),
                None => pool.input(idx),
            };
            fields.insert(Id::new(format!("f{idx}")), Value::Num(expr));
        }
        StructInstance::new(DeclRef::new(0), fields, pool)
    }

    #[test]
    fn serializes_fields_in_order() {
        let mut pool = ExprPool::new();
        let inst = instance(&mut pool, &[Some(1.0), Some(2.0), Some(3.0)]);
        assert!(inst.is_serializable());
        assert_eq!(inst.serialized_size(), 3);

        let mut buffer = vec![9.0; 2];
        let mut position = 1;
        assert!(inst.serialize(&pool, &mut buffer, &mut position));
        assert_eq!(position, 4);
        assert_eq!(buffer, vec![9.0, 1.0, 2.0, 3.0]);

        // serializing again overwrites the same region only
        let mut position = 1;
        assert!(inst.serialize(&pool, &mut buffer, &mut position));
        assert_eq!(buffer, vec![9.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn nested_instances_add_up() {
        let mut pool = ExprPool::new();
        let inner = Rc::new(instance(&mut pool, &[Some(4.0), Some(5.0)]));
        let one = pool.constant(1.0);
        let mut fields = LinkedHashMap::new();
        fields.insert(Id::new("a"), Value::Num(one));
        fields.insert(Id::new("b"), Value::Instance(inner));
        let outer = StructInstance::new(DeclRef::new(1), fields, &pool);
        assert_eq!(outer.serialized_size(), 3);
        let mut buffer = Vec::new();
        let mut position = 0;
        assert!(outer.serialize(&pool, &mut buffer, &mut position));
        assert_eq!(buffer, vec![1.0, 4.0, 5.0]);
    }

    #[test]
    fn symbolic_fields_are_not_serializable() {
        let mut pool = ExprPool::new();
        let inst = instance(&mut pool, &[Some(1.0), None]);
        assert!(!inst.is_serializable());
        let mut buffer = Vec::new();
        let mut position = 0;
        assert!(!inst.serialize(&pool, &mut buffer, &mut position));
        assert!(buffer.is_empty());
        assert_eq!(position, 0);
    }

    #[test]
    fn flatten_collects_leaves() {
        let mut pool = ExprPool::new();
        let inst = instance(&mut pool, &[Some(1.0), None]);
        let flat = Value::Instance(Rc::new(inst)).flatten().unwrap();
        assert_eq!(flat.len(), 2);
        assert!(Value::Error.flatten().is_none());
    }
}
