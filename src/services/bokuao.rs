//! Bokuao official blog. Listings start at page 1 and sit behind a member
//! session cookie, supplied through the group's `cookie` setting.

use crate::services::markup::SiteProfile;
use crate::services::selectors::SelectorSpec;
use crate::utils::date::DateFormat;

pub fn profile() -> SiteProfile {
    SiteProfile {
        list_path: |page| format!("/blog/list/1/0/?writer=0&page={page}"),
        start_page: 1,
        selectors: SelectorSpec {
            row: "li[data-delighter]",
            link: "a",
            exact_row_class: None,
            title: "p.tit",
            author: "p.writer",
            date: "p.date",
            body: "div.txt",
            must_have: None,
        },
        date_format: DateFormat::DotDate,
    }
}
