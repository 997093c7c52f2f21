/// Functions resolved before the user function table. They cannot be
/// overridden by a user definition of the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Input,
    Sleep,
    Split,
    IsNum,
    IsAlpha,
    ToNumber,
    ToString,
    ToBool,
    Len,
    Send,
    Close,
}

impl Builtin {
    pub const ALL: [Builtin; 12] = [
        Builtin::Print,
        Builtin::Input,
        Builtin::Sleep,
        Builtin::Split,
        Builtin::IsNum,
        Builtin::IsAlpha,
        Builtin::ToNumber,
        Builtin::ToString,
        Builtin::ToBool,
        Builtin::Len,
        Builtin::Send,
        Builtin::Close,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL
            .into_iter()
            .find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Input => "input",
            Builtin::Sleep => "sleep",
            Builtin::Split => "split",
            Builtin::IsNum => "isnum",
            Builtin::IsAlpha => "isalpha",
            Builtin::ToNumber => "to_number",
            Builtin::ToString => "to_string",
            Builtin::ToBool => "to_bool",
            Builtin::Len => "len",
            Builtin::Send => "send",
            Builtin::Close => "close",
        }
    }
}
