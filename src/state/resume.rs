/// In-memory snapshot of where a site's crawl stopped
///
/// Taken when the operator jumps straight to one site. The keyword loop asks
/// [`ResumeCursor::should_skip`] for every keyword: keywords before the saved
/// one are skipped, the saved one restarts at its saved page, and everything
/// after it runs from page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCursor {
    pub site: String,
    pub resume_keyword: Option<String>,
    pub resume_page: u32,
    pub skipping: bool,
}

impl ResumeCursor {
    pub fn new(site: &str, keyword: Option<String>, page: Option<u32>) -> Self {
        let skipping = keyword.is_some();
        Self {
            site: site.to_string(),
            resume_keyword: keyword,
            resume_page: page.unwrap_or(1).max(1),
            skipping,
        }
    }

    /// Returns `(skip, start_page)` for the next keyword
    pub fn should_skip(&mut self, keyword: &str) -> (bool, u32) {
        if !self.skipping {
            return (false, 1);
        }

        if self.resume_keyword.as_deref() != Some(keyword) {
            return (true, 1);
        }

        self.skipping = false;
        (false, self.resume_page)
    }
}
