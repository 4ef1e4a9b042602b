use thiserror::Error;

/// Falhas de validação de uma célula ou de um dia do grafo de desligamentos.
///
/// Uma célula inválida é descartada isoladamente; o restante do dia segue.
/// Um dia inválido ou repetido é descartado inteiro.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("código de status desconhecido: {0:?}")]
    UnknownCode(String),

    #[error("chave de hora não numérica: {0:?}")]
    InvalidHourKey(String),

    #[error("hora fora do intervalo 1..=24: {0}")]
    HourOutOfRange(i64),

    #[error("hora {0} repetida no mesmo dia")]
    DuplicateHour(u8),

    #[error("chave de dia fora da faixa aceita: {0}")]
    DayOutOfRange(i64),

    #[error("dia {0} repetido no grafo")]
    DuplicateDay(i64),
}

/// Falhas ao interpretar os carimbos de data/hora vindos do site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("carimbo vazio")]
    Empty,

    #[error("formato inválido: {0:?}")]
    Format(String),

    #[error("data fora da faixa aceita: {0}")]
    OutOfRange(String),

    #[error("horário inexistente no fuso de origem: {0}")]
    Nonexistent(String),

    #[error("fim ({end}) não é posterior ao início ({start})")]
    EndBeforeStart { start: String, end: String },
}

/// Erros de configuração detectados em `Config::validate`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("fuso horário desconhecido: {0}")]
    UnknownTimezone(String),

    #[error("nenhum endereço configurado")]
    NoAddresses,

    #[error("endereço duplicado: {0}")]
    DuplicateAddress(String),

    #[error("{0} deve ser maior que zero")]
    NotPositive(&'static str),

    #[error("{0} não pode ser negativo")]
    Negative(&'static str),
}
