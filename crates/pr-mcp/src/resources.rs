use serde_json::{json, Value};

/// Read-only resource addresses exposed to the agent.
///
/// Project segments arrive already path-encoded; the encoding is idempotent,
/// so raw paths work too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    /// `review://project/{encodedPath}/pending`
    Pending { project: String },
    /// `review://project/{encodedPath}/current`
    Current { project: String },
    /// `review://{id}`
    Review { id: String },
}

pub fn parse_resource_uri(uri: &str) -> Option<ResourceUri> {
    let rest = uri.strip_prefix("review://")?;
    if let Some(project) = rest.strip_prefix("project/") {
        if let Some(path) = project.strip_suffix("/pending") {
            if path.is_empty() {
                return None;
            }
            return Some(ResourceUri::Pending {
                project: path.to_string(),
            });
        }
        if let Some(path) = project.strip_suffix("/current") {
            if path.is_empty() {
                return None;
            }
            return Some(ResourceUri::Current {
                project: path.to_string(),
            });
        }
        return None;
    }
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(ResourceUri::Review {
        id: rest.to_string(),
    })
}

pub fn resource_listing() -> Value {
    json!({
        "resources": [
            {
                "uriTemplate": "review://project/{encodedPath}/pending",
                "description": "Pending review summaries for one project, newest first"
            },
            {
                "uriTemplate": "review://project/{encodedPath}/current",
                "description": "The freshest pending review for one project, in full"
            },
            {
                "uriTemplate": "review://{id}",
                "description": "One review in full"
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_shapes() {
        assert_eq!(
            parse_resource_uri("review://project/home_dev_app/pending"),
            Some(ResourceUri::Pending {
                project: "home_dev_app".to_string()
            })
        );
        assert_eq!(
            parse_resource_uri("review://project/home_dev_app/current"),
            Some(ResourceUri::Current {
                project: "home_dev_app".to_string()
            })
        );
        assert_eq!(
            parse_resource_uri("review://rev_01ARZ3NDEKTSV4RRFFQ69G5FAV"),
            Some(ResourceUri::Review {
                id: "rev_01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string()
            })
        );
    }

    #[test]
    fn rejects_malformed_uris() {
        for uri in [
            "review://",
            "review://project//pending",
            "review://project/home_dev_app",
            "review://project/home_dev_app/unknown",
            "review://rev_x/extra",
            "file://etc/passwd",
        ] {
            assert_eq!(parse_resource_uri(uri), None, "uri {uri:?}");
        }
    }
}
