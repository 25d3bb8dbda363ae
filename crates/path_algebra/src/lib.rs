//! Pure, stateless operations over virtual project paths.
//!
//! Every path here is a *project-relative* path: it always starts with `/`,
//! never contains `.` or `..` segments once normalized, and never has a
//! repeated `/`. None of these functions can fail; ambiguous input (e.g. `..`
//! walking above the root) resolves deterministically by clamping at root.

use relative_path::RelativePath;

/// Normalizes `p` into a project-relative path: single leading `/`,
/// collapsed repeated `/`, no trailing `/` (except the root itself).
pub fn to_app_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_string();
    }

    let mut out = String::with_capacity(p.len() + 1);
    out.push('/');
    let mut prev_was_slash = true;
    for c in p.chars() {
        if c == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
            out.push('/');
        } else {
            prev_was_slash = false;
            out.push(c);
        }
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Resolves `.` and `..` segments left to right. A `..` above the root is
/// clamped (dropped) rather than erroring.
pub fn normalize_dot_segments(p: &str) -> String {
    let app = to_app_path(p);
    let mut stack: Vec<&str> = Vec::new();
    for seg in app.trim_start_matches('/').split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            _ => stack.push(seg),
        }
    }

    if stack.is_empty() {
        "/".to_string()
    } else {
        let mut joined = RelativePath::new(stack[0]).to_owned();
        for seg in &stack[1..] {
            joined.push(seg);
        }
        format!("/{joined}")
    }
}

/// Parent directory of `p`. `dirname('/')` is `/`.
pub fn dirname(p: &str) -> String {
    let app = to_app_path(p);
    if app == "/" {
        return "/".to_string();
    }
    match app.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => app[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Final path segment of `p`. The root's basename is the empty string.
pub fn basename(p: &str) -> String {
    let app = to_app_path(p);
    if app == "/" {
        return String::new();
    }
    match app.rfind('/') {
        Some(idx) => app[idx + 1..].to_string(),
        None => app,
    }
}

/// Extension of `p`'s basename, including the leading `.`, or `""` if none.
pub fn extname(p: &str) -> String {
    let base = basename(p);
    match base.rfind('.') {
        // a leading dot (dotfile) is not an extension
        Some(idx) if idx > 0 => base[idx..].to_string(),
        _ => String::new(),
    }
}

/// Joins path segments with `/` and normalizes the dot segments of the result.
pub fn join(parts: &[&str]) -> String {
    let mut joined = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            joined.push('/');
        }
        joined.push_str(part);
    }
    normalize_dot_segments(&joined)
}

/// Resolves `rel` against the directory `base`. If `rel` is already absolute
/// it is normalized as-is; otherwise it is joined onto `base`.
pub fn resolve_relative(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        return normalize_dot_segments(rel);
    }
    join(&[base, rel])
}

/// Converts a project-relative path to a store filesystem path by prefixing
/// `/projects/<project>`.
pub fn to_fs_path(project: &str, app: &str) -> String {
    let app = to_app_path(app);
    if app == "/" {
        format!("/projects/{project}")
    } else {
        format!("/projects/{project}{app}")
    }
}

/// Inverse of [`to_fs_path`]: strips the `/projects/<project>` prefix,
/// returning `None` if `fs` is not rooted under that project.
pub fn fs_path_to_app_path(fs: &str, project: &str) -> Option<String> {
    let prefix = format!("/projects/{project}");
    let fs = to_app_path(fs);
    if fs == prefix {
        return Some("/".to_string());
    }
    fs.strip_prefix(&prefix)
        .filter(|rest| rest.starts_with('/'))
        .map(to_app_path)
}

/// True iff `p` equals `prefix` or starts with `prefix + "/"`.
pub fn has_prefix(p: &str, prefix: &str) -> bool {
    if p == prefix {
        return true;
    }
    let prefix_with_slash = if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };
    p.starts_with(&prefix_with_slash)
}
