//! The QWeb compilation environment.
//!
//! A [`QWeb`] instance owns the name→template mapping, the directive
//! registry templates compile against, and the render entry points. A
//! failed registration leaves the mapping unchanged.

use crate::error::{RegisterError, RenderError};
use crate::exec::{self, RenderExtra, RenderOptions};
use crate::value::Value;
use indexmap::IndexMap;
use qweb_compiler::{compile, DirectiveRegistry, Program};
use qweb_dom::{patch, Document, NoopModules, VNode};
use qweb_template::{parse_bundle, parse_template, ElementNode};
use smol_str::SmolStr;

/// A compiled template: immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Registration name.
    pub name: SmolStr,
    /// The compiled render program.
    pub program: Program,
    /// The parsed tree the program was compiled from.
    pub elem: ElementNode,
}

/// The template registry and compilation environment.
pub struct QWeb {
    templates: IndexMap<SmolStr, Template>,
    registry: DirectiveRegistry,
    options: RenderOptions,
}

impl Default for QWeb {
    fn default() -> Self {
        Self::new()
    }
}

impl QWeb {
    /// Create an empty environment with the builtin directives.
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
            registry: DirectiveRegistry::default(),
            options: RenderOptions::default(),
        }
    }

    /// Configure rendering; `dev: false` silences the `t-debug` and
    /// `t-log` directives.
    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// The configured render options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Register a single template from source.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), RegisterError> {
        let root = parse_template(source)?;
        self.register(name, root)
    }

    /// Register every `t-name` entry of a bundle document.
    pub fn load_templates(&mut self, bundle: &str) -> Result<(), RegisterError> {
        for (name, root) in parse_bundle(bundle)? {
            self.register(&name, root)?;
        }
        Ok(())
    }

    fn register(&mut self, name: &str, root: ElementNode) -> Result<(), RegisterError> {
        if self.templates.contains_key(name) {
            return Err(RegisterError::Conflict {
                name: name.to_string(),
            });
        }
        let program = compile(name, &root, &self.registry)?;
        let name = SmolStr::new(name);
        self.templates.insert(
            name.clone(),
            Template {
                name,
                program,
                elem: root,
            },
        );
        Ok(())
    }

    /// The registered templates, in registration order.
    pub fn templates(&self) -> &IndexMap<SmolStr, Template> {
        &self.templates
    }

    /// Look up a compiled template.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// The directive registry used for compilation of later registrations.
    pub fn registry_mut(&mut self) -> &mut DirectiveRegistry {
        &mut self.registry
    }

    /// Render a template to a vnode tree. The instance's render options
    /// govern the debugging directives.
    pub fn render(
        &self,
        name: &str,
        context: &Value,
        extra: &mut RenderExtra<'_>,
    ) -> Result<VNode, RenderError> {
        extra.options = self.options.clone();
        exec::execute(self, name, context, extra)
    }

    /// Render a template and serialize it to HTML through a scratch
    /// document. Named handlers resolve permissively.
    pub fn render_to_string(&self, name: &str, context: &Value) -> Result<String, RenderError> {
        let mut extra = RenderExtra::new(Some(&exec::PermissiveHost));
        let mut vnode = self.render(name, context, &mut extra)?;
        let mut doc = Document::new();
        let body = doc.body();
        patch::mount(&mut doc, body, &mut vnode, &mut NoopModules);
        Ok(doc.inner_html(body))
    }
}
