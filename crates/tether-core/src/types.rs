//! Type descriptors driving coercion and introspection
//!
//! A [`TypeDesc`] describes the target shape a value-model node must be
//! coerced into: a scalar kind, a sequence of some element type, a keyed
//! mapping, or a named record. Descriptors are declared at registration
//! time alongside each method's trampoline and read back verbatim by the
//! introspection reporter.

/// Scalar target kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Signed integer
    Int,
    /// Unsigned integer
    Uint,
    /// Floating point
    Float,
    /// Boolean
    Bool,
    /// UTF-8 string
    Str,
    /// Time span, carried on the wire as a nanosecond count
    Duration,
}

impl ScalarKind {
    /// Get the kind name used in reports and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Str => "string",
            ScalarKind::Duration => "duration",
        }
    }
}

/// Target shape for coercing one value-model node
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    /// A scalar of the given kind
    Scalar(ScalarKind),

    /// An ordered sequence with a uniform element type
    Sequence(Box<TypeDesc>),

    /// A mapping with scalar keys and a uniform value type
    Mapping {
        /// Key kind (string, or an integer kind parsed from string keys)
        key: ScalarKind,
        /// Value type
        value: Box<TypeDesc>,
    },

    /// A named structured record
    Record(RecordDesc),
}

impl TypeDesc {
    /// Signed integer scalar
    pub const INT: TypeDesc = TypeDesc::Scalar(ScalarKind::Int);
    /// Unsigned integer scalar
    pub const UINT: TypeDesc = TypeDesc::Scalar(ScalarKind::Uint);
    /// Floating point scalar
    pub const FLOAT: TypeDesc = TypeDesc::Scalar(ScalarKind::Float);
    /// Boolean scalar
    pub const BOOL: TypeDesc = TypeDesc::Scalar(ScalarKind::Bool);
    /// String scalar
    pub const STRING: TypeDesc = TypeDesc::Scalar(ScalarKind::Str);
    /// Duration scalar
    pub const DURATION: TypeDesc = TypeDesc::Scalar(ScalarKind::Duration);

    /// Build a sequence descriptor
    pub fn sequence(element: TypeDesc) -> TypeDesc {
        TypeDesc::Sequence(Box::new(element))
    }

    /// Build a mapping descriptor
    pub fn mapping(key: ScalarKind, value: TypeDesc) -> TypeDesc {
        TypeDesc::Mapping {
            key,
            value: Box::new(value),
        }
    }

    /// Render the descriptor as a type name for reports and errors
    pub fn type_name(&self) -> String {
        match self {
            TypeDesc::Scalar(kind) => kind.type_name().to_string(),
            TypeDesc::Sequence(element) => format!("list<{}>", element.type_name()),
            TypeDesc::Mapping { key, value } => {
                format!("map<{}, {}>", key.type_name(), value.type_name())
            }
            TypeDesc::Record(desc) => desc.name().to_string(),
        }
    }
}

/// Descriptor for a named record with ordered typed fields
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDesc {
    name: String,
    fields: Vec<(String, TypeDesc)>,
}

impl RecordDesc {
    /// Create a builder for a record descriptor
    pub fn builder(name: &str) -> RecordDescBuilder {
        RecordDescBuilder {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Get the record name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the ordered field list
    pub fn fields(&self) -> &[(String, TypeDesc)] {
        &self.fields
    }
}

/// Builder for [`RecordDesc`] instances
pub struct RecordDescBuilder {
    name: String,
    fields: Vec<(String, TypeDesc)>,
}

impl RecordDescBuilder {
    /// Add a field with name and target type
    pub fn field(mut self, name: &str, desc: TypeDesc) -> Self {
        self.fields.push((name.to_string(), desc));
        self
    }

    /// Build the RecordDesc
    pub fn build(self) -> RecordDesc {
        RecordDesc {
            name: self.name,
            fields: self.fields,
        }
    }
}
