use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::RepoLocation;

/// Characters escaped inside one URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// HTTP verb of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verb plus a path template with `{owner}`, `{repo}` and `{path}` slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub template: &'static str,
}

impl Route {
    pub const READ_CONTENTS: Route = Route {
        method: Method::Get,
        template: "/repos/{owner}/{repo}/contents/{path}",
    };

    pub const WRITE_CONTENTS: Route = Route {
        method: Method::Put,
        template: "/repos/{owner}/{repo}/contents/{path}",
    };

    pub const CURRENT_USER: Route = Route {
        method: Method::Get,
        template: "/user",
    };

    /// Fill the template slots from a repository location.
    ///
    /// Each slot is percent-encoded; `/` separators inside the file path are
    /// kept.
    pub fn render(&self, location: &RepoLocation) -> String {
        let path: Vec<String> = location
            .path
            .trim_start_matches('/')
            .split('/')
            .map(encode_segment)
            .collect();
        self.template
            .replace("{owner}", &encode_segment(&location.owner))
            .replace("{repo}", &encode_segment(&location.name))
            .replace("{path}", &path.join("/"))
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}
