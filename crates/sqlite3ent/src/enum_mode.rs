/// Define an enum with string representations, accepted connection-string
/// literals and a default variant.
///
/// The first literal of each variant is its canonical PRAGMA value. Any further
/// literals after `|` are aliases accepted when parsing. All matching is
/// ASCII case-insensitive.
macro_rules! enum_mode {
    (
        $(#[$meta:meta])* $vis:vis $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $str:literal $(| $alias:literal)*, )+
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl Default for $name {
            fn default() -> Self { Self::$default }
        }

        impl $name {
            /// Every literal accepted by [`Self::from_literal`], in declaration order.
            pub const LITERALS: &'static [&'static str] = &[ $( $str, $( $alias, )* )+ ];

            pub(crate) fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }

            /// Parse a connection-string literal, ignoring ASCII case.
            pub fn from_literal(s: &str) -> Option<Self> {
                $(
                    if s.eq_ignore_ascii_case($str) $( || s.eq_ignore_ascii_case($alias) )* {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl $crate::enum_mode::Literal for $name {
            const LITERALS: &'static [&'static str] = Self::LITERALS;

            fn from_literal(s: &str) -> Option<Self> {
                Self::from_literal(s)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Connection-string parsing shared by every [`enum_mode!`] type.
pub(crate) trait Literal: Sized {
    const LITERALS: &'static [&'static str];

    fn from_literal(s: &str) -> Option<Self>;
}
