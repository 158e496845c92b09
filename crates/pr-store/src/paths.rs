/// Turn a project path into a filesystem-safe directory name: strip one
/// leading `/`, then replace every `/` and `:` with `_`. The encoding is
/// one-way and idempotent — encoding an already-encoded value is a no-op —
/// so callers may pass either form.
pub fn encode_project_path(path: &str) -> String {
    path.strip_prefix('/')
        .unwrap_or(path)
        .replace(['/', ':'], "_")
}
