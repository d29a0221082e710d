//! # Filter Graphs
//!
//! A typed model of an ffmpeg `-filter_complex` description. Values are kept
//! raw while the graph is built and escaped only by [`FilterGraph::render`]:
//! first for the filter's option parser, then for the graph parser.

use std::fmt::Display;

/// One filter option
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Positional(String),
    Named(String, String),
}

/// A single filter with its options, e.g. `scale=640:480`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional option
    pub fn arg<V: Display>(mut self, value: V) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Append a `key=value` option
    pub fn named<K: Into<String>, V: Display>(mut self, key: K, value: V) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[FilterArg] {
        &self.args
    }

    /// Value of a named option, unescaped
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| match arg {
                FilterArg::Positional(value) => escape_filter_graph(&escape_option_value(value)),
                FilterArg::Named(key, value) => {
                    format!("{}={}", key, escape_filter_graph(&escape_option_value(value)))
                }
            })
            .collect();
        format!("{}={}", self.name, args.join(":"))
    }
}

/// Filters applied in sequence between labelled inputs and outputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<S: Into<String>>(mut self, label: S) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output<S: Into<String>>(mut self, label: S) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for label in &self.inputs {
            rendered.push_str(&format!("[{}]", label));
        }
        let filters: Vec<String> = self.filters.iter().map(Filter::render).collect();
        rendered.push_str(&filters.join(","));
        for label in &self.outputs {
            rendered.push_str(&format!("[{}]", label));
        }
        rendered
    }
}

/// A complete `-filter_complex` graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// All filters of the graph, in chain order
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.chains.iter().flat_map(|chain| chain.filters.iter())
    }

    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(FilterChain::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a value for a filter's own option parser
pub fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Escape a filter description for the graph parser
pub fn escape_filter_graph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

/// Shortest decimal form of a number (`2`, `0.5`, `0.333333`)
pub fn number(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_chains() {
        let mut graph = FilterGraph::new();
        graph.push(
            FilterChain::new()
                .input("0:v")
                .filter(Filter::new("scale").arg(640).arg(360))
                .filter(Filter::new("setsar").arg(1))
                .output("v0"),
        );
        graph.push(
            FilterChain::new()
                .input("v0")
                .input("v1")
                .filter(Filter::new("hstack").named("inputs", 2))
                .output("out"),
        );

        assert_eq!(
            graph.render(),
            "[0:v]scale=640:360,setsar=1[v0];[v0][v1]hstack=inputs=2[out]"
        );
    }

    #[test]
    fn test_filter_without_args() {
        assert_eq!(Filter::new("null").render(), "null");
    }

    #[test]
    fn test_two_level_escaping() {
        let filter = Filter::new("drawtext").named("text", "a'b:c,d");
        assert_eq!(filter.render(), r"drawtext=text=a\\\'b\\:c\,d");
        assert_eq!(filter.get("text"), Some("a'b:c,d"));
    }

    #[test]
    fn test_expressions_keep_their_commas_escaped() {
        let filter = Filter::new("drawtext")
            .named("text", "%{pts:hms}")
            .named("enable", "lte(t,4.5)");
        assert_eq!(
            filter.render(),
            r"drawtext=text=%{pts\\:hms}:enable=lte(t\,4.5)"
        );
    }

    #[test]
    fn test_brackets_and_semicolons_cannot_break_the_graph() {
        let filter = Filter::new("drawtext").named("text", "[x];y");
        assert_eq!(filter.render(), r"drawtext=text=\[x\]\;y");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(2.0), "2");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(1.0 / 3.0), "0.333333");
        assert_eq!(number(0.0), "0");
    }
}
