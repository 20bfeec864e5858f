pub(crate) fn split_once<'a>(s: &'a str, c: char) -> (&'a str, Option<&'a str>) {
    match s.find(c) {
        Some(n) => (&s[0..n], Some(&s[n + c.len_utf8()..])),
        None => (s, None),
    }
}

pub(crate) fn rsplit_once<'a>(s: &'a str, c: char) -> Option<(&'a str, &'a str)> {
    s.rfind(c).map(|n| (&s[0..n], &s[n + c.len_utf8()..]))
}

pub(crate) fn drop_last_space(s: &str) -> &str {
    s.strip_suffix(' ').unwrap_or(s)
}
