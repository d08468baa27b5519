//! Page/per-page pagination for the REST list endpoints.

use serde::Deserialize;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Offset pagination parameters as they arrive on the query string.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    /// Normalize out-of-range values instead of rejecting them.
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.clamped().per_page)
    }

    pub fn offset(&self) -> i64 {
        let p = self.clamped();
        i64::from(p.page - 1) * i64::from(p.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_first_page_of_twenty() {
        let params = PageParams::default();
        assert_eq!(params.limit(), 20);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn per_page_is_clamped() {
        let params = PageParams {
            page: 1,
            per_page: 500,
        };
        assert_eq!(params.limit(), 100);

        let params = PageParams {
            page: 1,
            per_page: 0,
        };
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn zero_page_is_treated_as_first() {
        let params = PageParams {
            page: 0,
            per_page: 10,
        };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn offset_advances_by_page() {
        let params = PageParams {
            page: 3,
            per_page: 10,
        };
        assert_eq!(params.offset(), 20);
    }
}
