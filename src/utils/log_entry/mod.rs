pub mod backup;
pub mod schedule;
pub mod system;

#[macro_export]
macro_rules! define_log_entries {
    ($name:ident {
        $(
            #[error($message:literal)]
            $variant:ident: $level:expr,
        )*
    }) => {
        #[derive(Debug, Clone, Copy, thiserror::Error)]
        pub enum $name {
            $(
                #[error($message)]
                $variant,
            )*
        }

        impl $name {
            #[allow(dead_code)]
            pub fn level(&self) -> tracing::Level {
                match self {
                    $(Self::$variant => $level,)*
                }
            }
        }
    };
}
