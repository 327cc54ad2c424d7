//! Directive registry.
//!
//! Directives are records in a priority-ordered list; the compiler sorts an
//! element's directive attributes with it and rejects anything unknown.
//! Prefix entries (trailing `-`) match families like `t-att-*` and
//! `t-on-*`.

/// A registered directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    /// Name without the `t-` prefix; a trailing `-` marks a prefix family.
    pub name: &'static str,
    /// Dispatch priority; lower runs earlier.
    pub priority: u8,
}

/// The ordered directive set of a compilation environment.
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    directives: Vec<Directive>,
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        let mut registry = Self {
            directives: Vec::new(),
        };
        for directive in BUILTIN_DIRECTIVES {
            registry.add(*directive);
        }
        registry
    }
}

/// Builtin directives in dispatch order: structure first (`t-foreach`,
/// conditionals, `t-call`, `t-set`), then content, attributes, listeners
/// and node annotations.
const BUILTIN_DIRECTIVES: &[Directive] = &[
    Directive { name: "name", priority: 0 },
    Directive { name: "debug", priority: 1 },
    Directive { name: "log", priority: 2 },
    Directive { name: "foreach", priority: 10 },
    Directive { name: "as", priority: 11 },
    Directive { name: "if", priority: 20 },
    Directive { name: "elif", priority: 25 },
    Directive { name: "else", priority: 30 },
    Directive { name: "call", priority: 40 },
    Directive { name: "set", priority: 60 },
    Directive { name: "value", priority: 61 },
    Directive { name: "esc", priority: 70 },
    Directive { name: "raw", priority: 80 },
    Directive { name: "att", priority: 90 },
    Directive { name: "attf-", priority: 91 },
    Directive { name: "att-", priority: 92 },
    Directive { name: "on", priority: 100 },
    Directive { name: "on-", priority: 100 },
    Directive { name: "ref", priority: 110 },
    Directive { name: "widget", priority: 120 },
    Directive { name: "key", priority: 125 },
    Directive { name: "transition", priority: 130 },
];

impl DirectiveRegistry {
    /// Register a directive, keeping the list sorted by priority.
    pub fn add(&mut self, directive: Directive) {
        let pos = self
            .directives
            .partition_point(|d| d.priority <= directive.priority);
        self.directives.insert(pos, directive);
    }

    /// Resolve a directive attribute name (without `t-`) to its registered
    /// entry: exact matches win over prefix families.
    pub fn resolve(&self, name: &str) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|d| d.name == name)
            .or_else(|| {
                self.directives.iter().find(|d| {
                    d.name.ends_with('-') && name.starts_with(d.name) && name.len() > d.name.len()
                })
            })
    }

    /// The priority of a directive attribute name, for sorting.
    pub fn priority(&self, name: &str) -> Option<u8> {
        self.resolve(name).map(|d| d.priority)
    }

    /// Sort directive names (without `t-`) into dispatch order, keeping
    /// source order among equal priorities.
    pub fn sort<'a>(&self, names: &mut Vec<(&'a str, usize)>) {
        names.sort_by_key(|(name, source_idx)| {
            (self.priority(name).unwrap_or(u8::MAX), *source_idx)
        });
    }

    /// All registered directives in priority order.
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}

/// Split a family directive name into its family and argument, e.g.
/// `att-class` → `("att-", "class")`.
pub fn family_argument(name: &str) -> Option<(&str, &str)> {
    for family in ["attf-", "att-", "on-"] {
        if let Some(arg) = name.strip_prefix(family) {
            return Some((family, arg));
        }
    }
    None
}

/// Normalized directive key used for dispatch, mapping family members onto
/// their family entry.
pub fn dispatch_key(name: &str) -> &str {
    family_argument(name).map(|(family, _)| family).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_and_family() {
        let registry = DirectiveRegistry::default();
        assert!(registry.resolve("esc").is_some());
        assert!(registry.resolve("att-class").is_some());
        assert!(registry.resolve("on-click").is_some());
        assert!(registry.resolve("attf-href").is_some());
        assert!(registry.resolve("bogus").is_none());
        // bare "t-on-" resolves to nothing useful but "on" exists for the
        // missing-event-name diagnostic
        assert!(registry.resolve("on").is_some());
    }

    #[test]
    fn test_priority_order() {
        let registry = DirectiveRegistry::default();
        assert!(registry.priority("foreach").unwrap() < registry.priority("if").unwrap());
        assert!(registry.priority("if").unwrap() < registry.priority("call").unwrap());
        assert!(registry.priority("set").unwrap() < registry.priority("esc").unwrap());
        assert!(registry.priority("esc").unwrap() < registry.priority("att-class").unwrap());
        assert!(registry.priority("att-id").unwrap() < registry.priority("on-click").unwrap());
        assert!(registry.priority("on-click").unwrap() < registry.priority("ref").unwrap());
        assert!(registry.priority("ref").unwrap() < registry.priority("widget").unwrap());
        assert!(registry.priority("widget").unwrap() < registry.priority("transition").unwrap());
    }

    #[test]
    fn test_custom_directive() {
        let mut registry = DirectiveRegistry::default();
        registry.add(Directive { name: "custom", priority: 50 });
        assert!(registry.resolve("custom").is_some());
        assert!(registry.priority("custom").unwrap() > registry.priority("call").unwrap());
    }

    #[test]
    fn test_family_argument() {
        assert_eq!(family_argument("att-class"), Some(("att-", "class")));
        assert_eq!(family_argument("on-click"), Some(("on-", "click")));
        assert_eq!(family_argument("esc"), None);
        assert_eq!(dispatch_key("attf-href"), "attf-");
        assert_eq!(dispatch_key("if"), "if");
    }
}
