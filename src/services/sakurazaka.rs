//! Sakurazaka46 official blog.

use crate::services::markup::SiteProfile;
use crate::services::selectors::SelectorSpec;
use crate::utils::date::DateFormat;

pub fn profile() -> SiteProfile {
    SiteProfile {
        list_path: |page| format!("/s/s46/diary/blog/list?page={page}"),
        start_page: 0,
        selectors: SelectorSpec {
            // Sidebar and ranking widgets reuse `box` alongside other classes
            row: "li.box",
            link: "a",
            exact_row_class: Some("box"),
            title: "h3.title",
            author: ".name",
            date: "div.blog-foot .date",
            body: "div.box-article",
            must_have: Some("div.blog-foot"),
        },
        date_format: DateFormat::SlashMinutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::selectors::SiteSelectors;
    use chrono::{TimeZone, Utc};
    use url::Url;

    const LIST: &str = r#"
        <ul class="com-blog-part">
          <li class="box"><a href="/s/s46/diary/detail/60123?ima=0000&cd=blog">a</a></li>
          <li class="box ranking"><a href="/s/s46/diary/detail/1?cd=blog">ranked</a></li>
          <li class="box"><a href="/s/s46/diary/detail/60120?ima=0000&cd=blog">b</a></li>
          <li class="box"><span>no link</span></li>
        </ul>"#;

    const DETAIL: &str = r#"
        <h3 class="title">タイトル</h3>
        <p class="name">山下 瞳月</p>
        <div class="box-article"><p>本文</p><img src="/files/14/diary/s46/blog/img.jpg"></div>
        <div class="blog-foot"><p class="date">2025/03/14 21:05</p></div>"#;

    #[test]
    fn test_parse_listing_requires_exact_class() {
        let selectors = SiteSelectors::compile(&profile().selectors).unwrap();
        let base = Url::parse("https://sakurazaka46.com").unwrap();
        let stubs = selectors.extract_stubs(LIST, &base);
        let ids: Vec<&str> = stubs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["60123", "60120"]);
    }

    #[test]
    fn test_parse_detail() {
        let selectors = SiteSelectors::compile(&profile().selectors).unwrap();
        let page = Url::parse("https://sakurazaka46.com/s/s46/diary/detail/60123").unwrap();
        let detail = selectors
            .extract_detail(DETAIL, "60123", &page, "Sakurazaka46", profile().date_format)
            .unwrap();

        assert_eq!(detail.item.title, "タイトル");
        assert_eq!(detail.item.author_name, "山下瞳月");
        assert_eq!(
            detail.item.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 14, 12, 5, 0).unwrap()
        );
        assert_eq!(
            detail.item.image_urls,
            vec!["https://sakurazaka46.com/files/14/diary/s46/blog/img.jpg".to_string()]
        );
    }

    #[test]
    fn test_detail_without_footer_is_skipped() {
        let selectors = SiteSelectors::compile(&profile().selectors).unwrap();
        let page = Url::parse("https://sakurazaka46.com/s/s46/diary/detail/1").unwrap();
        let html = r#"<p class="name">a</p><div class="box-article">x</div>"#;
        assert!(selectors
            .extract_detail(html, "1", &page, "Sakurazaka46", profile().date_format)
            .is_none());
    }
}
