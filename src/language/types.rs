use std::fmt;

/// A type as written in source: a keyword or a bracketed array of types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn array(inner: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(inner))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Array(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// Static type of an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Number,
    Bool,
    String,
    Void,
    ArrayNumber,
    ArrayString,
    ArrayBool,
    Func,
    CChannel,
    SChannel,
}

impl Type {
    /// Resolves written type syntax. Only one level of array nesting over a
    /// scalar has a static type; anything else is `None`.
    pub fn from_type_expr(expr: &TypeExpr) -> Option<Type> {
        match expr {
            TypeExpr::Named(name) => match name.as_str() {
                "number" => Some(Type::Number),
                "bool" => Some(Type::Bool),
                "string" => Some(Type::String),
                "void" => Some(Type::Void),
                "func" => Some(Type::Func),
                "c_channel" => Some(Type::CChannel),
                "s_channel" => Some(Type::SChannel),
                _ => None,
            },
            TypeExpr::Array(inner) => match inner.as_ref() {
                TypeExpr::Named(_) => Type::from_type_expr(inner)?.array_of(),
                TypeExpr::Array(_) => None,
            },
        }
    }

    pub fn array_of(self) -> Option<Type> {
        match self {
            Type::Number => Some(Type::ArrayNumber),
            Type::String => Some(Type::ArrayString),
            Type::Bool => Some(Type::ArrayBool),
            _ => None,
        }
    }

    pub fn element(self) -> Option<Type> {
        match self {
            Type::ArrayNumber => Some(Type::Number),
            Type::ArrayString => Some(Type::String),
            Type::ArrayBool => Some(Type::Bool),
            _ => None,
        }
    }

    pub fn is_array(self) -> bool {
        self.element().is_some()
    }

    /// Whether a value of type `value` may be stored where `self` is declared.
    /// Any array is accepted for an array slot so `[]` fits every array type.
    pub fn accepts(self, value: Type) -> bool {
        self == value || (self.is_array() && value.is_array())
    }

    pub fn is_printable(self) -> bool {
        matches!(
            self,
            Type::Number
                | Type::Bool
                | Type::String
                | Type::ArrayNumber
                | Type::ArrayString
                | Type::ArrayBool
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Number => "NUMBER",
            Type::Bool => "BOOL",
            Type::String => "STRING",
            Type::Void => "VOID",
            Type::ArrayNumber => "ARRAY_NUMBER",
            Type::ArrayString => "ARRAY_STRING",
            Type::ArrayBool => "ARRAY_BOOL",
            Type::Func => "FUNC",
            Type::CChannel => "C_CHANNEL",
            Type::SChannel => "S_CHANNEL",
        };
        f.write_str(name)
    }
}
