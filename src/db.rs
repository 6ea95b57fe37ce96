// ==========================================
// 合购后台系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 幂等建表；参照实体与份额带唯一键，跨导入并发由存储层去重
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 打开数据库并确保表结构存在
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;

    if let Some(version) = read_schema_version(&conn)? {
        if version != CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                db_path,
                found = version,
                expected = CURRENT_SCHEMA_VERSION,
                "schema_version 与代码不一致"
            );
        }
    }

    Ok(conn)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (scope_id, key)
);

-- ===== 参照实体 =====
CREATE TABLE IF NOT EXISTS administradoras (
    id                TEXT PRIMARY KEY,
    nome              TEXT NOT NULL,
    nome_normalizado  TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS representantes (
    id                TEXT PRIMARY KEY,
    nome              TEXT NOT NULL,
    nome_normalizado  TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS vendedores (
    id                TEXT PRIMARY KEY,
    nome              TEXT NOT NULL,
    nome_normalizado  TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS clientes (
    id                TEXT PRIMARY KEY,
    nome              TEXT NOT NULL,
    nome_normalizado  TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS cotas (
    id                 TEXT PRIMARY KEY,
    codigo             TEXT NOT NULL,
    grupo              TEXT NOT NULL,
    tipo               TEXT NOT NULL,
    administradora_id  TEXT REFERENCES administradoras(id),
    chave              TEXT NOT NULL UNIQUE,
    created_at         TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===== 销售及从属记录 =====
CREATE TABLE IF NOT EXISTS vendas (
    id                TEXT PRIMARY KEY,
    cota_id           TEXT REFERENCES cotas(id),
    cliente_id        TEXT REFERENCES clientes(id),
    vendedor_id       TEXT REFERENCES vendedores(id),
    representante_id  TEXT REFERENCES representantes(id),
    data_venda        TEXT NOT NULL,
    valor_credito     REAL NOT NULL DEFAULT 0,
    valor_total       REAL NOT NULL DEFAULT 0,
    situacao          TEXT NOT NULL DEFAULT 'ATIVO',
    observacao        TEXT,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_vendas_cota ON vendas(cota_id);

CREATE TABLE IF NOT EXISTS recebimentos (
    id              TEXT PRIMARY KEY,
    venda_id        TEXT NOT NULL REFERENCES vendas(id),
    parcela         INTEGER NOT NULL,
    valor_recebido  REAL NOT NULL,
    data_credito    TEXT NOT NULL,
    created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS inadimplencias (
    id             TEXT PRIMARY KEY,
    venda_id       TEXT NOT NULL REFERENCES vendas(id),
    valor          REAL NOT NULL,
    observacao     TEXT,
    status         TEXT NOT NULL DEFAULT 'ABERTO',
    data_registro  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_inadimplencias_venda ON inadimplencias(venda_id, status);

CREATE TABLE IF NOT EXISTS ajustes_conciliacao (
    id              TEXT PRIMARY KEY,
    venda_id        TEXT NOT NULL REFERENCES vendas(id),
    tipo            TEXT NOT NULL,
    diferenca       REAL NOT NULL,
    valor_esperado  REAL NOT NULL,
    valor_real      REAL NOT NULL,
    observacao      TEXT,
    created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS comissoes_regras (
    id                   TEXT PRIMARY KEY,
    venda_id             TEXT NOT NULL REFERENCES vendas(id),
    vendedor_id          TEXT NOT NULL REFERENCES vendedores(id),
    percentual_vendedor  REAL NOT NULL,
    valor_previsto       REAL NOT NULL,
    parcelas             INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS comissoes_representantes (
    id                    TEXT PRIMARY KEY,
    venda_id              TEXT NOT NULL REFERENCES vendas(id),
    representante_id      TEXT NOT NULL REFERENCES representantes(id),
    percentual            REAL NOT NULL,
    percentual_adicional  REAL,
    valor                 REAL NOT NULL
);

-- ===== 佣金规则与应收佣金 =====
CREATE TABLE IF NOT EXISTS regras_comissao (
    id                 TEXT PRIMARY KEY,
    nome               TEXT NOT NULL,
    tipo               TEXT NOT NULL,
    administradora_id  TEXT REFERENCES administradoras(id),
    grupo_filtro       TEXT,
    ativo              INTEGER NOT NULL DEFAULT 1,
    created_at         TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS faixas_comissao (
    id              TEXT PRIMARY KEY,
    regra_id        TEXT NOT NULL REFERENCES regras_comissao(id) ON DELETE CASCADE,
    ordem           INTEGER NOT NULL,
    percentual      REAL NOT NULL,
    parcelas        INTEGER NOT NULL,
    meses_carencia  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS comissoes_receber (
    id                     TEXT PRIMARY KEY,
    venda_id               TEXT NOT NULL REFERENCES vendas(id),
    vendedor_id            TEXT REFERENCES vendedores(id),
    representante_id       TEXT REFERENCES representantes(id),
    regra_id               TEXT REFERENCES regras_comissao(id),
    faixa_id               TEXT REFERENCES faixas_comissao(id),
    tipo                   TEXT NOT NULL,
    parcela                INTEGER NOT NULL,
    total_parcelas         INTEGER NOT NULL,
    base_calculo           REAL NOT NULL,
    percentual             REAL NOT NULL,
    valor_previsto         REAL NOT NULL,
    valor_pago             REAL,
    competencia_origem     TEXT NOT NULL,
    competencia_pagamento  TEXT NOT NULL,
    status                 TEXT NOT NULL DEFAULT 'PENDENTE',
    motivo_bloqueio        TEXT,
    data_liberacao         TEXT,
    data_pagamento         TEXT,
    created_at             TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_comissoes_receber_venda ON comissoes_receber(venda_id, status);
CREATE INDEX IF NOT EXISTS idx_comissoes_receber_competencia ON comissoes_receber(competencia_pagamento);

-- ===== 导入日志 =====
CREATE TABLE IF NOT EXISTS import_logs (
    id                    TEXT PRIMARY KEY,
    tipo_importacao       TEXT NOT NULL,
    nome_arquivo          TEXT NOT NULL,
    total_linhas          INTEGER NOT NULL,
    linhas_validas        INTEGER NOT NULL,
    linhas_rejeitadas     INTEGER NOT NULL,
    valor_total_recebido  REAL NOT NULL DEFAULT 0,
    total_divergencias    INTEGER NOT NULL DEFAULT 0,
    erros                 TEXT,
    warnings              TEXT,
    created_at            TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
