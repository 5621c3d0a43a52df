use std::path::PathBuf;

xflags::xflags! {
    /// Compose and apply trees of text edits.
    cmd quilt {
        /// Apply an edit script to a file and print the result.
        cmd apply {
            /// File the edits run against.
            required file: PathBuf
            /// JSON edit script.
            required script: PathBuf
            /// Rewrite the file instead of printing the result.
            optional -i, --in-place
            /// Write the inverse script here after a successful apply.
            optional -u, --undo undo: PathBuf
        }
        /// Build the edit tree and dry-run it without touching the file.
        cmd check {
            /// File the edits run against.
            required file: PathBuf
            /// JSON edit script.
            required script: PathBuf
        }
    }
}
