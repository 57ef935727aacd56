//! Hinatazaka46 official blog.

use crate::services::markup::SiteProfile;
use crate::services::selectors::SelectorSpec;
use crate::utils::date::DateFormat;

pub fn profile() -> SiteProfile {
    SiteProfile {
        list_path: |page| format!("/s/official/diary/member/list?page={page}"),
        start_page: 0,
        selectors: SelectorSpec {
            row: ".p-blog-group > .p-blog-article",
            link: "a.c-button-blog-detail",
            exact_row_class: None,
            title: ".c-blog-article__title",
            author: ".c-blog-article__name",
            date: ".c-blog-article__date",
            body: ".c-blog-article__text",
            must_have: None,
        },
        date_format: DateFormat::DotMinutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::selectors::SiteSelectors;
    use chrono::{TimeZone, Utc};
    use url::Url;

    const LIST: &str = r#"
        <div class="p-blog-group">
          <div class="p-blog-article">
            <a class="c-button-blog-detail" href="/s/official/diary/detail/58112?ima=0000&cd=member">read</a>
          </div>
          <div class="p-blog-article">
            <a class="c-button-blog-detail" href="/s/official/diary/detail/58110?ima=0000&cd=member">read</a>
          </div>
        </div>
        <div class="p-blog-article">
          <a class="c-button-blog-detail" href="/s/official/diary/detail/1">outside group</a>
        </div>"#;

    const DETAIL: &str = r#"
        <div class="c-blog-article__title">  春の日 </div>
        <div class="c-blog-article__name"> 小坂 菜緒 </div>
        <div class="c-blog-article__date">2025.3.14 09:30</div>
        <div class="c-blog-article__text">
          <p>こんにちは</p><img src="https://cdn.hinatazaka46.com/a.jpg"><img src="/files/b.jpg">
        </div>"#;

    #[test]
    fn test_list_path() {
        assert_eq!(
            (profile().list_path)(3),
            "/s/official/diary/member/list?page=3"
        );
    }

    #[test]
    fn test_parse_listing() {
        let selectors = SiteSelectors::compile(&profile().selectors).unwrap();
        let base = Url::parse("https://hinatazaka46.com").unwrap();
        let stubs = selectors.extract_stubs(LIST, &base);
        let ids: Vec<&str> = stubs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["58112", "58110"]);
        assert_eq!(
            stubs[0].url(),
            Some("https://hinatazaka46.com/s/official/diary/detail/58112?ima=0000&cd=member")
        );
    }

    #[test]
    fn test_parse_detail() {
        let selectors = SiteSelectors::compile(&profile().selectors).unwrap();
        let page = Url::parse("https://hinatazaka46.com/s/official/diary/detail/58112").unwrap();
        let detail = selectors
            .extract_detail(DETAIL, "58112", &page, "Hinatazaka46", profile().date_format)
            .unwrap();

        assert_eq!(detail.item.title, "春の日");
        assert_eq!(detail.item.author_name, "小坂菜緒");
        assert_eq!(
            detail.item.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 14, 0, 30, 0).unwrap()
        );
        assert_eq!(
            detail.item.image_urls,
            vec![
                "https://cdn.hinatazaka46.com/a.jpg".to_string(),
                "https://hinatazaka46.com/files/b.jpg".to_string(),
            ]
        );
        assert!(detail.content.contains("<p>こんにちは</p>"));
        assert_eq!(detail.item.group_id, "Hinatazaka46");
    }
}
