//! Macro that turns the event-kind declarations into the per-kind rule table.

/// Map DSL token -> [`Requirement`](crate::Requirement).
#[macro_export]
macro_rules! __requirement {
    ( content . $key:ident ) => {
        $crate::Requirement::NonEmptyText {
            section: $crate::Section::Content,
            key: stringify!($key),
        }
    };
    ( metadata . $key:ident ) => {
        $crate::Requirement::NonEmptyText {
            section: $crate::Section::Metadata,
            key: stringify!($key),
        }
    };
}

/// Declarative well-known event kinds. Generates the kind constants,
/// `KNOWN_EVENT_TYPES`, and `requirements_for`, which maps any other
/// event type to an empty rule set.
#[macro_export]
macro_rules! define_event_kinds {
    (
        $(
            kind $Name:ident = $tag:literal {
                $( $section:ident . $key:ident ),* $(,)?
            }
        ),* $(,)?
    ) => {
        /// Well-known event type tags.
        pub mod kinds {
            $( pub const $Name: &str = $tag; )*
        }

        pub const KNOWN_EVENT_TYPES: &[&str] = &[ $( $tag ),* ];

        /// Extra constraints for `event_type`. Unknown kinds get none.
        pub fn requirements_for(event_type: &str) -> &'static [$crate::Requirement] {
            match event_type {
                $( $tag => &[ $( $crate::__requirement!($section . $key) ),* ], )*
                _ => &[],
            }
        }
    };
}
