use pandeps_core::requirements;
use pandeps_core::version::Operator;

#[test]
fn test_from_path_reads_every_requires_line() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("cpanfile");
    std::fs::write(
        &path,
        "requires 'Mojolicious', '>= 0.05';\n\
         requires 'DBI';\n\
         # a comment line\n\
         requires 'Plack', '1.0'; # REQS: URI-1.60\n",
    )
    .unwrap();

    let list = requirements::from_path(&path).unwrap();
    assert_eq!(list.len(), 3);
    assert!(list.owner().is_none());

    let names: Vec<&str> = list.entries().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["Mojolicious", "DBI", "Plack"]);
    assert_eq!(list.entries()[0].constraint.operator, Operator::Ge);
    assert_eq!(list.entries()[2].additional[0].name, "URI");
}

#[test]
fn test_from_path_missing_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = requirements::from_path(&tmp.path().join("cpanfile")).unwrap_err();
    assert!(err.to_string().contains("Requirements error"), "got: {err}");
}
