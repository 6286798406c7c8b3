/// Functions whose unwind tables are dropped before matching. Their
/// hand-written startup code gives every toolchain a different shape.
pub const DEFAULT_IGNORED_FUNCTIONS: [&str; 2] = ["_start", "__libc_csu_init"];

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub ignored_functions: Vec<String>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            ignored_functions: DEFAULT_IGNORED_FUNCTIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl CompareOptions {
    pub fn ignore_function(mut self, name: impl Into<String>) -> Self {
        self.ignored_functions.push(name.into());
        self
    }

    pub fn is_ignored(&self, symbol: Option<&str>) -> bool {
        symbol.is_some_and(|name| self.ignored_functions.iter().any(|ignored| ignored == name))
    }
}
