use sha2::{Digest, Sha256};

/// Derive the local file name of a tarball from its URL.
///
/// The name is `{name}-{hash}-{version}.tgz` where:
/// * `name` is the path before the `/-/` marker with `/` turned into `-` and `@` removed,
/// * `hash` is the SHA-256 of the URL relative to `registry` (the full URL when the tarball
///   lives elsewhere), which keeps mirrors of the same package apart,
/// * `version` is the `major.minor.patch` token right before `.tgz`.
///
/// Characters outside `[A-Za-z0-9._-]` are replaced by `-`.
pub fn artifact_file_name(registry: &str, tarball_url: &str) -> String {
    let relative_url = tarball_url.strip_prefix(registry).unwrap_or(tarball_url);
    let path = url_path(relative_url);

    let name = match path.split_once("/-/") {
        Some((name, _)) => name,
        None => path.rsplit_once('/').map_or(path, |(dir, _)| dir),
    };
    let name = sanitize(&name.replace('@', "").replace('/', "-"));

    let file = path.rsplit('/').next().unwrap_or(path);
    let version = match version_token(file) {
        Some(version) => format!("{version}.tgz"),
        None => sanitize(file),
    };

    let hash = format!("{:x}", Sha256::digest(relative_url.as_bytes()));

    format!("{name}-{hash}-{version}")
}

/// Strip scheme, authority, query, and fragment if `url` is absolute.
fn url_path(url: &str) -> &str {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
        None => url.trim_start_matches('/'),
    }
}

/// The last three dot-separated numbers right before `.tgz`, e.g. `7.22.5` in `core-7.22.5.tgz`.
fn version_token(file: &str) -> Option<&str> {
    let stem = file.strip_suffix(".tgz")?;
    let start = stem
        .char_indices()
        .rev()
        .take_while(|(_, char)| char.is_ascii_digit() || *char == '.')
        .last()
        .map(|(index, _)| index)?;
    let run = &stem[start..];
    let mut dots = run.rmatch_indices('.').map(|(index, _)| index);
    let (_, _) = (dots.next()?, dots.next()?);
    let token = match dots.next() {
        Some(index) => &run[index + 1..],
        None => run,
    };
    let is_version =
        token.split('.').count() == 3 && token.split('.').all(|part| !part.is_empty());
    is_version.then_some(token)
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|char| match char {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => char,
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REGISTRY: &str = "https://registry.npmjs.org/";

    fn hash_of(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    #[test]
    fn unscoped_package() {
        let url = "https://registry.npmjs.org/is-odd/-/is-odd-3.0.1.tgz";
        assert_eq!(
            artifact_file_name(REGISTRY, url),
            format!("is-odd-{}-3.0.1.tgz", hash_of("is-odd/-/is-odd-3.0.1.tgz")),
        );
    }

    #[test]
    fn scoped_package() {
        let url = "https://registry.npmjs.org/@babel/core/-/core-7.22.5.tgz";
        let name = artifact_file_name(REGISTRY, url);
        assert_eq!(name, format!("babel-core-{}-7.22.5.tgz", hash_of("@babel/core/-/core-7.22.5.tgz")));
        assert!(!name.contains('/'));
        assert!(!name.contains('@'));
    }

    #[test]
    fn deterministic() {
        let url = "https://registry.npmjs.org/react/-/react-18.2.0.tgz";
        assert_eq!(artifact_file_name(REGISTRY, url), artifact_file_name(REGISTRY, url));
    }

    #[test]
    fn mirrors_of_the_same_package_do_not_collide() {
        let official = "https://registry.npmjs.org/react/-/react-18.2.0.tgz";
        let mirror = "https://mirror.example.com/react/-/react-18.2.0.tgz";
        let official_name = artifact_file_name(REGISTRY, official);
        let mirror_name = artifact_file_name(REGISTRY, mirror);
        assert_ne!(official_name, mirror_name);
        assert!(official_name.starts_with("react-"));
        assert!(mirror_name.starts_with("react-"));
        assert!(official_name.ends_with("-18.2.0.tgz"));
        assert!(mirror_name.ends_with("-18.2.0.tgz"));
    }

    #[test]
    fn prerelease_keeps_the_trailing_triple() {
        let url = "https://registry.npmjs.org/next/-/next-13.0.0-canary.1.2.3.tgz";
        assert!(artifact_file_name(REGISTRY, url).ends_with("-1.2.3.tgz"));
    }

    #[test]
    fn name_ending_with_digits() {
        let url = "https://registry.npmjs.org/v8/-/v8-1.2.3.tgz";
        assert!(artifact_file_name(REGISTRY, url).ends_with("-1.2.3.tgz"));
        assert!(artifact_file_name(REGISTRY, url).starts_with("v8-"));
    }

    #[test]
    fn file_without_version_token() {
        let url = "https://registry.npmjs.org/odd/-/odd-1.0.0-beta.tgz";
        let name = artifact_file_name(REGISTRY, url);
        assert!(name.starts_with("odd-"));
        assert!(name.ends_with("-odd-1.0.0-beta.tgz"));
    }

    #[test]
    fn version_token_cases() {
        assert_eq!(version_token("core-7.22.5.tgz"), Some("7.22.5"));
        assert_eq!(version_token("lib8.1.2.3.tgz"), Some("1.2.3"));
        assert_eq!(version_token("core-7.22.tgz"), None);
        assert_eq!(version_token("core-7.22.5.zip"), None);
        assert_eq!(version_token("core-beta.tgz"), None);
    }
}
