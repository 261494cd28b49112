/// Declares a closed set of OpenSIPS event names.
///
/// Each variant is paired with the name OpenSIPS puts on the first line of an
/// event datagram. Besides the enum this expands to `as_str()`, `all()`,
/// `from_wire()`, `Display`, `AsRef<str>` and a case-insensitive `FromStr`
/// whose error is the given newtype around the rejected string.
///
/// ```ignore
/// define_name_enum! {
///     error_type: ParseStatusEventError,
///     pub enum StatusEvent {
///         Dispatcher => "E_DISPATCHER_STATUS",
///         LoadBalancer => "E_LOAD_BALANCER_STATUS",
///     }
/// }
/// ```
macro_rules! define_name_enum {
    (
        error_type: $Err:ident,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            const ALL: &'static [$Name] = &[ $( $Name::$variant, )+ ];

            /// Name as it appears on the first line of an event datagram.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }

            /// Every known name, in declaration order.
            pub fn all() -> &'static [$Name] {
                Self::ALL
            }

            /// Look up a datagram event name, ignoring ASCII case.
            pub fn from_wire(name: &str) -> Option<$Name> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|known| name.eq_ignore_ascii_case(known.as_str()))
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_wire(s).ok_or_else(|| $Err(s.to_string()))
            }
        }
    };
}
