//! Path-encoded result column naming.
//!
//! A compiled read query flattens a whole type graph into one row, so every selected column
//! needs a name that says which relation it came from. The relation is identified by its
//! traversal path: the root type key followed by each part accessor or ancestor key that
//! was descended, joined with `.`.
//!
//! Both the path and the column may contain `_`, so the path length is encoded up front
//! and decoding never has to guess.
//!
//! ## Format
//! `p{N}_{path}_{column}`
//!
//! Where `N` is the byte length of `path`.
//!
//! ## Examples
//! - `("car", "color")` → `"p3_car_color"`
//! - `("car.vehicle", "maker")` → `"p11_car.vehicle_maker"`
//! - `("car.vehicle.wheel", "surrogate")` → `"p17_car.vehicle.wheel_surrogate"`

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Path of a relation reached from `parent` through `segment`
pub fn child_path(parent: &str, segment: &str) -> String {
    format!("{parent}{PATH_SEPARATOR}{segment}")
}

/// Result column name for `column` of the relation at `path`.
///
/// # Examples
/// ```
/// use rmtgraph::utils::column_naming::column_alias;
///
/// assert_eq!(column_alias("car", "color"), "p3_car_color");
/// assert_eq!(column_alias("car.vehicle", "maker"), "p11_car.vehicle_maker");
/// ```
pub fn column_alias(path: &str, column: &str) -> String {
    format!("p{}_{path}_{column}", path.len())
}

/// Split a result column name back into `(path, column)`.
///
/// Returns `None` if the name doesn't match the `p{N}_{path}_{column}` format.
///
/// # Examples
/// ```
/// use rmtgraph::utils::column_naming::parse_column_alias;
///
/// assert_eq!(
///     parse_column_alias("p11_car.vehicle_maker"),
///     Some(("car.vehicle".to_string(), "maker".to_string()))
/// );
/// assert_eq!(parse_column_alias("maker"), None);
/// ```
pub fn parse_column_alias(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix('p')?;

    let digit_end = rest.find(|c: char| !c.is_ascii_digit())?;
    if digit_end == 0 {
        return None;
    }
    let path_len: usize = rest[..digit_end].parse().ok()?;
    if path_len == 0 {
        return None;
    }

    let after_underscore = rest[digit_end..].strip_prefix('_')?;
    let path = after_underscore.get(..path_len)?;
    let column = after_underscore[path_len..].strip_prefix('_')?;
    if column.is_empty() {
        return None;
    }

    Some((path.to_string(), column.to_string()))
}

/// Path segments, root first
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_columns() {
        assert_eq!(column_alias("wheel", "circumference"), "p5_wheel_circumference");
        assert_eq!(
            parse_column_alias("p5_wheel_circumference"),
            Some(("wheel".to_string(), "circumference".to_string()))
        );
    }

    #[test]
    fn test_nested_path_with_underscores() {
        let path = child_path(&child_path("sports_car", "car"), "spare_wheel");
        assert_eq!(path, "sports_car.car.spare_wheel");

        let alias = column_alias(&path, "tyre_size");
        assert_eq!(alias, "p26_sports_car.car.spare_wheel_tyre_size");
        assert_eq!(
            parse_column_alias(&alias),
            Some((path.clone(), "tyre_size".to_string()))
        );
        assert_eq!(
            path_segments(&path).collect::<Vec<_>>(),
            vec!["sports_car", "car", "spare_wheel"]
        );
    }

    #[test]
    fn test_rejects_foreign_names() {
        assert_eq!(parse_column_alias("id"), None);
        assert_eq!(parse_column_alias("p_x_y"), None);
        assert_eq!(parse_column_alias("p0__x"), None);
        assert_eq!(parse_column_alias("p9_car_color"), None);
        assert_eq!(parse_column_alias("p3_car_"), None);
        assert_eq!(parse_column_alias(""), None);
    }
}
