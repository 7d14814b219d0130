//! `Link` header parsing.
//!
//! GitHub paginates with RFC 8288 links, e.g.
//! `<https://api.github.com/repositories/1/stargazers?page=2>; rel="next"`.

use url::Url;

/// Page numbers extracted from a `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<u32>,
    pub prev: Option<u32>,
    pub first: Option<u32>,
    pub last: Option<u32>,
}

impl PageLinks {
    pub fn parse(header: &str) -> Self {
        let mut links = Self::default();

        for part in header.split(',') {
            let mut segments = part.split(';');
            let Some(target) = segments.next() else {
                continue;
            };
            let target = target.trim().trim_start_matches('<').trim_end_matches('>');
            let Some(page) = page_param(target) else {
                continue;
            };

            for param in segments {
                let param = param.trim();
                let Some(rel) = param.strip_prefix("rel=") else {
                    continue;
                };
                match rel.trim_matches('"') {
                    "next" => links.next = Some(page),
                    "prev" => links.prev = Some(page),
                    "first" => links.first = Some(page),
                    "last" => links.last = Some(page),
                    _ => {}
                }
            }
        }

        links
    }
}

fn page_param(target: &str) -> Option<u32> {
    let url = Url::parse(target).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}
