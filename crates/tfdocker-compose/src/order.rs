//! サービスの起動順序

use crate::error::{ComposeError, Result};
use crate::model::ComposeFile;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// `depends_on` に従った起動順序を返す
///
/// サービス名を名前順に並べてから深さ優先で辿り、依存先を先に出力する
/// （帰りがけ順）。同じ入力からは常に同じ順序になる。
pub fn service_order(file: &ComposeFile) -> Result<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(file.services.len());

    // BTreeMap なのでキーは名前順
    for name in file.services.keys() {
        let mut path = Vec::new();
        visit(file, name, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    file: &'a ComposeFile,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            path.push(name);
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            return Err(ComposeError::CircularDependency(path[start..].join(" -> ")));
        }
        None => {}
    }

    let Some(service) = file.services.get(name) else {
        return Ok(());
    };

    marks.insert(name, Mark::Visiting);
    path.push(name);

    let mut deps: Vec<&String> = service.depends_on.iter().collect();
    deps.sort();
    for dep in deps {
        if !file.services.contains_key(dep.as_str()) {
            return Err(ComposeError::UnknownDependency {
                service: name.to_string(),
                dependency: dep.clone(),
            });
        }
        visit(file, dep, marks, path, order)?;
    }

    path.pop();
    marks.insert(name, Mark::Done);
    order.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Service;

    fn file(deps: &[(&str, &[&str])]) -> ComposeFile {
        let mut file = ComposeFile::default();
        for (name, depends_on) in deps {
            file.services.insert(
                name.to_string(),
                Service {
                    depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        file
    }

    #[test]
    fn test_dependencies_first() {
        let file = file(&[("web", &["api"]), ("api", &["db", "cache"]), ("db", &[]), ("cache", &[])]);
        let order = service_order(&file).unwrap();
        assert_eq!(order, vec!["cache", "db", "api", "web"]);
    }

    #[test]
    fn test_independent_services_sorted() {
        let file = file(&[("zeta", &[]), ("alpha", &[]), ("mid", &[])]);
        assert_eq!(service_order(&file).unwrap(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_shared_dependency_emitted_once() {
        let file = file(&[("a", &["db"]), ("b", &["db"]), ("db", &[])]);
        assert_eq!(service_order(&file).unwrap(), vec!["db", "a", "b"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let file = file(&[("web", &["ghost"])]);
        match service_order(&file) {
            Err(ComposeError::UnknownDependency {
                service,
                dependency,
            }) => {
                assert_eq!(service, "web");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_circular_dependency() {
        let file = file(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        match service_order(&file) {
            Err(ComposeError::CircularDependency(cycle)) => {
                assert_eq!(cycle, "a -> b -> c -> a");
            }
            other => panic!("expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency() {
        let file = file(&[("a", &["a"])]);
        assert!(matches!(
            service_order(&file),
            Err(ComposeError::CircularDependency(_))
        ));
    }
}
