use std::{fs, path::Path};

use rscommit::object::{Commit, CommitStamp, Id};

pub const INITIAL_COMMIT: &str = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                                  author A U Thor <author@example.com> 1112911993 -0700\n\
                                  committer C O Mitter <committer@example.com> 1112911993 -0700\n\
                                  \n\
                                  initial\n";

// $ git hash-object -t commit --stdin < initial
pub const INITIAL_COMMIT_ID: &str = "66fe8b3f2df5c2a6e67944af865f3a0893093d69";

#[allow(dead_code)]
pub const EMPTY_TREE_ID: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Writes a commit record named `name` into `dir` and returns its ID.
#[allow(dead_code)]
pub fn write_commit(dir: &Path, name: &str, summary: &str, parents: &[Id]) -> Id {
    let author = CommitStamp::new("A U Thor", "author@example.com", 1_112_911_993, -420);
    let committer = CommitStamp::new("C O Mitter", "committer@example.com", 1_112_911_993, -420);

    let commit = Commit::new(
        EMPTY_TREE_ID.parse().unwrap(),
        parents.to_vec(),
        author,
        committer,
        summary,
        "",
    );

    fs::write(dir.join(name), commit.serialize()).unwrap();
    commit.id()
}
