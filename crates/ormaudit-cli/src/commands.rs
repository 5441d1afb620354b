//! Command execution.

use crate::config::{CliConfig, Command, RoleCommand, UserCommand};
use crate::error::{CliError, CliResult};
use crate::formatter::Formatter;
use ormaudit_core::security::{new_role, new_user, register_principals};
use ormaudit_core::{
    authenticate, AuditTrail, EntityRecord, FieldDef, Mapper, MapperConfig, Model,
    PermissionRecord, Query, Registry, ScalarType, Session, TrailFilter,
};
use rusqlite::Connection;
use std::sync::Arc;

/// Sample entity used by `demo` and available for grants.
pub struct DemoModel;

impl Model for DemoModel {
    const TYPE_NAME: &'static str = "DemoModel";

    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::optional_scalar("name", ScalarType::Text)]
    }
}

/// Registry of the entities this tool manages.
pub fn build_registry() -> CliResult<Arc<Registry>> {
    let registry = Arc::new(Registry::new());
    register_principals(&registry)?;
    registry.register_model::<DemoModel>()?;
    Ok(registry)
}

/// Execute a command and return formatted output.
pub fn execute(
    config: &CliConfig,
    command: Command,
    formatter: &dyn Formatter,
) -> CliResult<String> {
    if command == Command::Demo {
        return run_demo(formatter);
    }

    let mapper = Mapper::with_config(build_registry()?, config.mapper.clone());
    let mut conn = Connection::open(&config.db_path)?;
    tracing::debug!(db = %config.db_path.display(), "database opened");
    execute_on(&mapper, &mut conn, command, formatter)
}

/// Execute a command against an open connection.
pub fn execute_on(
    mapper: &Mapper,
    conn: &mut Connection,
    command: Command,
    formatter: &dyn Formatter,
) -> CliResult<String> {
    match command {
        Command::Init => {
            mapper.init_schema(conn)?;
            Ok(formatter.format_message("schema initialized"))
        }
        Command::Grant {
            entity,
            read,
            create,
            update,
            delete,
        } => {
            let record = PermissionRecord {
                entity,
                read,
                create,
                update,
                delete,
            };
            mapper.permissions().grant(conn, &record)?;
            Ok(formatter.format_permissions(&[record]))
        }
        Command::Revoke { entity } => {
            if !mapper.permissions().revoke(conn, &entity)? {
                return Err(CliError::NotGranted(entity));
            }
            Ok(formatter.format_message(&format!("revoked permissions on {}", entity)))
        }
        Command::Permissions => {
            let records = mapper.permissions().list(conn)?;
            Ok(formatter.format_permissions(&records))
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file).map_err(|source| CliError::Io {
                path: file.clone(),
                source,
            })?;
            let applied = mapper.permissions().import_json(conn, &json)?;
            Ok(formatter.format_message(&format!("imported {} permission records", applied)))
        }
        Command::Log {
            entity,
            record,
            limit,
        } => {
            let mut filter = TrailFilter::new().with_limit(limit);
            if let Some(entity) = entity {
                filter = filter.with_entity(entity);
            }
            if let Some(record) = record {
                filter = filter.with_record_id(record);
            }
            let entries = AuditTrail::entries(conn, &filter)?;
            Ok(formatter.format_entries(&entries))
        }
        Command::User(UserCommand::Add {
            username,
            password,
            name,
        }) => {
            let mut user = new_user(mapper.registry(), &username, &password)?;
            if let Some(name) = name {
                user.set("name", name)?;
            }
            let mut session = mapper.session(conn)?;
            session.insert(&mut user)?;
            session.commit()?;
            Ok(formatter.format_message(&format!("added {}", user)))
        }
        Command::Role(RoleCommand::Add { name }) => {
            let mut role = new_role(mapper.registry(), &name)?;
            let mut session = mapper.session(conn)?;
            session.insert(&mut role)?;
            session.commit()?;
            Ok(formatter.format_message(&format!("added {}", role)))
        }
        Command::Role(RoleCommand::Assign { username, role }) => {
            let mut session = mapper.session(conn)?;
            let user = find_one(&session, "User", "username", &username)?
                .ok_or_else(|| CliError::UnknownUser(username.clone()))?;
            let role_record = find_one(&session, "Role", "name", &role)?
                .ok_or_else(|| CliError::UnknownRole(role.clone()))?;
            session.link(&user, "roles", &role_record)?;
            session.commit()?;
            Ok(formatter.format_message(&format!("assigned role {} to {}", role, username)))
        }
        Command::Login { username, password } => {
            let principal = authenticate(conn, &username, &password)?.into_principal()?;
            Ok(formatter.format_principal(&principal))
        }
        Command::Demo => run_demo(formatter),
    }
}

fn find_one(
    session: &Session<'_>,
    entity: &str,
    field: &str,
    value: &str,
) -> CliResult<Option<EntityRecord>> {
    let query = Query::new(entity).filter_eq(field, value).limit(1);
    Ok(session.query(&query)?.into_iter().next().map(|row| row.record))
}

/// Walk through the intercepted lifecycle of one record on a scratch database.
fn run_demo(formatter: &dyn Formatter) -> CliResult<String> {
    let mapper = Mapper::with_config(build_registry()?, MapperConfig::default());
    let mut conn = Connection::open_in_memory()?;
    mapper.init_schema(&conn)?;

    {
        let session = mapper.session(&mut conn)?;
        match session.all(DemoModel::TYPE_NAME) {
            Err(err) if err.is_permission_denied() => {
                tracing::info!(error = %err, "read without a permission record is refused")
            }
            other => tracing::warn!(?other, "read without a permission record was not refused"),
        }
    }

    mapper
        .permissions()
        .grant(&conn, &PermissionRecord::allow_all("demo_model"))?;

    let mut record = mapper.new_model::<DemoModel>()?.with("name", "guido")?;
    {
        let mut session = mapper.session(&mut conn)?;
        session.insert(&mut record)?;
        session.commit()?;
    }
    tracing::info!(record = %record, "inserted");

    {
        let mut session = mapper.session(&mut conn)?;
        record.set("name", "tim")?;
        session.update(&mut record)?;
        session.update(&mut record)?;
        session.commit()?;
    }
    tracing::info!(record = %record, "updated twice, second time without changes");

    let record_id = record.id().unwrap_or_default();
    {
        let mut session = mapper.session(&mut conn)?;
        session.delete(&mut record)?;
        session.commit()?;
    }
    tracing::info!(record_id, "deleted");

    let history = AuditTrail::history(&conn, "demo_model", record_id)?;
    Ok(formatter.format_entries(&history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::JsonFormatter;
    use ormaudit_core::InterceptorConfig;

    fn setup() -> (Mapper, Connection) {
        let config = MapperConfig::default()
            .with_interceptor(InterceptorConfig::new().without_read_enforcement());
        let mapper = Mapper::with_config(build_registry().unwrap(), config);
        let mut conn = Connection::open_in_memory().unwrap();
        execute_on(&mapper, &mut conn, Command::Init, &JsonFormatter).unwrap();
        (mapper, conn)
    }

    fn run(mapper: &Mapper, conn: &mut Connection, command: Command) -> serde_json::Value {
        let output = execute_on(mapper, conn, command, &JsonFormatter).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_grant_and_list() {
        let (mapper, mut conn) = setup();
        run(
            &mapper,
            &mut conn,
            Command::Grant {
                entity: "demo_model".into(),
                read: true,
                create: false,
                update: false,
                delete: false,
            },
        );

        let listed = run(&mapper, &mut conn, Command::Permissions);
        assert_eq!(listed[0]["entity"], "demo_model");
        assert_eq!(listed[0]["read"], true);
        assert_eq!(listed[0]["create"], false);
    }

    #[test]
    fn test_revoke_missing_record() {
        let (mapper, mut conn) = setup();
        let err = execute_on(
            &mapper,
            &mut conn,
            Command::Revoke {
                entity: "user".into(),
            },
            &JsonFormatter,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::NotGranted(_)));
    }

    #[test]
    fn test_import_file() {
        let (mapper, mut conn) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");
        std::fs::write(&path, r#"[{"entity": "user", "read": true}]"#).unwrap();

        run(&mapper, &mut conn, Command::Import { file: path });
        let listed = run(&mapper, &mut conn, Command::Permissions);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let err = execute_on(
            &mapper,
            &mut conn,
            Command::Import {
                file: dir.path().join("missing.json"),
            },
            &JsonFormatter,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_user_role_and_login() {
        let (mapper, mut conn) = setup();
        run(
            &mapper,
            &mut conn,
            Command::User(UserCommand::Add {
                username: "guido".into(),
                password: "spam".into(),
                name: Some("Guido".into()),
            }),
        );
        run(
            &mapper,
            &mut conn,
            Command::Role(RoleCommand::Add {
                name: "admin".into(),
            }),
        );
        run(
            &mapper,
            &mut conn,
            Command::Role(RoleCommand::Assign {
                username: "guido".into(),
                role: "admin".into(),
            }),
        );

        let linked: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_role_rel", [], |row| row.get(0))
            .unwrap();
        assert_eq!(linked, 1);

        let principal = run(
            &mapper,
            &mut conn,
            Command::Login {
                username: "guido".into(),
                password: "spam".into(),
            },
        );
        assert_eq!(principal["username"], "guido");
        assert_eq!(principal["name"], "Guido");

        let err = execute_on(
            &mapper,
            &mut conn,
            Command::Login {
                username: "guido".into(),
                password: "eggs".into(),
            },
            &JsonFormatter,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Security(_)));

        let log = run(
            &mapper,
            &mut conn,
            Command::Log {
                entity: Some("user".into()),
                record: None,
                limit: 10,
            },
        );
        assert_eq!(log[0]["operation"], "create");
    }

    #[test]
    fn test_assign_unknown_role() {
        let (mapper, mut conn) = setup();
        run(
            &mapper,
            &mut conn,
            Command::User(UserCommand::Add {
                username: "guido".into(),
                password: "spam".into(),
                name: None,
            }),
        );
        let err = execute_on(
            &mapper,
            &mut conn,
            Command::Role(RoleCommand::Assign {
                username: "guido".into(),
                role: "ghost".into(),
            }),
            &JsonFormatter,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::UnknownRole(ref r) if r == "ghost"));
    }

    #[test]
    fn test_demo_history() {
        let output = run_demo(&JsonFormatter).unwrap();
        let history: serde_json::Value = serde_json::from_str(&output).unwrap();
        let operations: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["operation"].as_str().unwrap())
            .collect();
        assert_eq!(operations, vec!["create", "update", "update", "delete"]);
        assert_eq!(history[1]["fields"][0]["old_value"], "guido");
        assert_eq!(history[1]["fields"][0]["new_value"], "tim");
        assert!(history[2]["fields"].as_array().unwrap().is_empty());
    }
}
