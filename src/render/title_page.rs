use crate::flow::{parse_inline, Inline};
use crate::render::composer::Composer;

/// What the title page shows.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleInfo<'a> {
    pub title: &'a str,
    pub author: Option<&'a str>,
    /// Part number and part count, when the book is split
    pub part: Option<(usize, usize)>,
}

/// Draws the title page onto the composer's current page and moves past it.
pub fn render_title_page(composer: &mut Composer, info: &TitleInfo) {
    let style = composer.style();
    let page = &style.title_page;
    let height = style.geometry.height;
    let between = page.between * height;

    let mut top = (height * (1.0 - page.top)).min(style.frame().top());
    let title = page.title.case.apply(info.title);
    top = composer.place(&parse_inline(&title), &page.title, top);

    if let Some(author) = info.author.filter(|a| !a.trim().is_empty()) {
        top -= between;
        let line = if page.author_prefix.is_empty() {
            author.to_string()
        } else {
            format!("{} {author}", page.author_prefix)
        };
        top = composer.place(&[Inline::plain(line)], &page.author, top);
    }

    if let Some((number, total)) = info.part {
        top -= between;
        composer.place(
            &[Inline::plain(format!("Part {number} of {total}"))],
            &page.part,
            top,
        );
    }

    log::debug!("Rendered title page for `{}`", info.title);
    composer.new_page();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleDescriptor, StyleResolver};

    #[test]
    fn can_render_title_page() {
        let mut resolver = StyleResolver::new("fonts");
        let style = resolver
            .resolve(&StyleDescriptor::default())
            .expect("style resolves");
        let mut composer = Composer::new(&style, resolver.fonts());
        render_title_page(
            &mut composer,
            &TitleInfo {
                title: "A Book",
                author: Some("Sam Writer"),
                part: Some((2, 3)),
            },
        );
        assert_eq!(composer.page_index(), 1);
        let composed = composer.finish();
        assert_eq!(composed.pages.len(), 1);
        let text = composed.pages[0].text();
        assert!(text.contains("A Book"));
        assert!(text.contains("By Sam Writer"));
        assert!(text.contains("Part 2 of 3"));
    }

    #[test]
    fn single_parts_have_no_part_label() {
        let mut resolver = StyleResolver::new("fonts");
        let style = resolver
            .resolve(&StyleDescriptor::default())
            .expect("style resolves");
        let mut composer = Composer::new(&style, resolver.fonts());
        render_title_page(
            &mut composer,
            &TitleInfo {
                title: "A Book",
                author: None,
                part: None,
            },
        );
        let composed = composer.finish();
        assert!(!composed.pages[0].text().contains("Part"));
    }
}
