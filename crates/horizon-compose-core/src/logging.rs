//! Logging and debugging facilities for Horizon Compose.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output by subsystem
//! - A text rendering of a built component tree
//! - A span guard for timing builds
//!
//! # Tracing Integration
//!
//! Horizon Compose only emits `tracing` events. Install a subscriber in the
//! application to see them:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_compose_core::hooks=debug")
//!     .init();
//! ```
//!
//! # Tree Dump
//!
//! ```ignore
//! use horizon_compose_core::logging::TreeDump;
//!
//! println!("{}", TreeDump::new().format(&container));
//! ```

use std::fmt::Write as _;

use crate::model::{ComponentTree, Container, WidgetId};

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_compose_core";
    /// Event bus emission and subscription.
    pub const BUS: &str = "horizon_compose_core::event_bus";
    /// Lifecycle hook barrier.
    pub const HOOKS: &str = "horizon_compose_core::hooks";
    /// Planned index registration.
    pub const INDEX: &str = "horizon_compose_core::planned_index";
    /// Tree construction.
    pub const BUILDER: &str = "horizon_compose_core::builder";
    /// Live container operations.
    pub const CONTAINER: &str = "horizon_compose_core::container";
    /// Datasource fetches and query-string sync.
    pub const DATASOURCE: &str = "horizon_compose_core::datasource";
    pub const NAVIGATION: &str = "horizon_compose_core::navigation";
    pub const SESSION: &str = "horizon_compose_core::session";
    pub const CONFIG: &str = "horizon_compose_core::config";
}

/// Branch drawing style for [`TreeDump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Dashes only.
    Compact,
}

/// What a [`TreeDump`] includes.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Show the component type next to the name.
    pub show_types: bool,
    /// Show fields under their widget.
    pub show_fields: bool,
    /// Show the datasource route of widgets that have one.
    pub show_routes: bool,
    /// Maximum widget depth (None for unlimited).
    pub max_depth: Option<usize>,
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_types: true,
            show_fields: true,
            show_routes: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Everything, including datasource routes.
    pub fn detailed() -> Self {
        Self {
            show_routes: true,
            ..Default::default()
        }
    }

    /// Widget names only.
    pub fn minimal() -> Self {
        Self {
            show_types: false,
            show_fields: false,
            show_routes: false,
            ..Default::default()
        }
    }
}

/// Renders a container's component tree as text.
#[derive(Debug, Clone, Default)]
pub struct TreeDump {
    options: TreeFormatOptions,
}

impl TreeDump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Render the whole container.
    pub fn format(&self, container: &Container) -> String {
        let mut out = String::new();
        write!(out, "{}", display_name(container.name())).expect("write to String");
        if self.options.show_types {
            out.push_str(" (Container)");
        }
        writeln!(out, " #{}", container.generation()).expect("write to String");

        container.with_tree(|tree| {
            let roots = tree.roots();
            if roots.is_empty() {
                out.push_str("  (empty)\n");
            }
            for (i, id) in roots.iter().enumerate() {
                self.format_widget(tree, *id, 1, i + 1 == roots.len(), &mut out);
            }
        });
        out
    }

    fn format_widget(&self, tree: &ComponentTree, id: WidgetId, depth: usize, is_last: bool, out: &mut String) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(widget) = tree.widget(id) else {
            return;
        };

        out.push_str(&self.prefix(depth, is_last));
        out.push_str(display_name(widget.name()));
        if self.options.show_types {
            write!(out, " ({})", widget.widget_type()).expect("write to String");
        }
        if self.options.show_routes && !widget.datasource().route().is_empty() {
            write!(out, " -> {}", widget.datasource().route()).expect("write to String");
        }
        out.push('\n');

        if self.options.show_fields {
            let pad = self.field_prefix(depth);
            for field in tree.fields_of(id) {
                write!(out, "{pad}.{}", display_name(field.name())).expect("write to String");
                if self.options.show_types {
                    write!(out, " ({})", field.field_type()).expect("write to String");
                }
                out.push('\n');
            }
        }

        let children = widget.widgets();
        for (i, child) in children.iter().enumerate() {
            self.format_widget(tree, *child, depth + 1, i + 1 == children.len(), out);
        }
    }

    fn prefix(&self, depth: usize, is_last: bool) -> String {
        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 1..depth {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }

    fn field_prefix(&self, depth: usize) -> String {
        let branch = match self.options.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };
        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(unnamed)" } else { name }
}

/// A guard that keeps a timing span entered until dropped.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_compose::perf", "perf", operation = name);
        Self { _span: span.entered() }
    }
}
