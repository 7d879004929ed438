/// Handle type bound by the reference presenters.
///
/// Remembers what was last bound into it and how often it was bound and
/// recycled, so tests can check that recycling reached the right presenter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeHandle {
    pub content: Option<String>,
    pub binds: usize,
    pub recycles: usize,
}

impl ProbeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, content: String) {
        self.content = Some(content);
        self.binds += 1;
    }

    pub fn recycle(&mut self) {
        self.content = None;
        self.recycles += 1;
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}
