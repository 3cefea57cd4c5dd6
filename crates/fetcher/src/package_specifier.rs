use std::{convert::Infallible, fmt, str::FromStr};

/// Prefix of a range that redirects to another package, as in `npm:string-width@^4.2.0`.
const ALIAS_PREFIX: &str = "npm:";

/// What to resolve: a package name and a version range, which may be empty.
///
/// Aliases are resolved while parsing, so `name` is always the package to ask the
/// registry for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpecifier {
    pub name: String,
    pub range: String,
}

impl PackageSpecifier {
    /// Parse `name` or `name@range`. The name of a scoped package keeps its leading `@`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let separator = input.get(1..).and_then(|rest| rest.find('@')).map(|index| index + 1);
        match separator {
            Some(index) => PackageSpecifier::from_dependency(&input[..index], &input[index + 1..]),
            None => PackageSpecifier { name: input.to_string(), range: String::new() },
        }
    }

    /// Build a specifier from an entry of a dependency map.
    pub fn from_dependency(name: &str, range: &str) -> Self {
        match range.trim().strip_prefix(ALIAS_PREFIX) {
            Some(target) => PackageSpecifier::parse(target),
            None => PackageSpecifier { name: name.to_string(), range: range.trim().to_string() },
        }
    }
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.range.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{0}@{1}", self.name, self.range)
        }
    }
}

impl FromStr for PackageSpecifier {
    type Err = Infallible;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(PackageSpecifier::parse(input))
    }
}
