//! Built-in signal table of the lock PLC
//!
//! Sparse: only the bits with a known meaning are listed. Every entry here
//! is an alarm (`AL`); the event bank ships empty and is populated from
//! `[[faults]]` config entries.

use crate::types::FaultSeverity::{self, Critical, High, Low, Medium};

pub(super) const ENCHIMENTO: &str = "AL_EnchimentoRG";
pub(super) const ESVAZIAMENTO: &str = "AL_Esvaziamento";
pub(super) const PORTA_JUSANTE: &str = "AL_PortaJusante";
pub(super) const PORTA_MONTANTE: &str = "AL_PortaMontante";
pub(super) const SALA_DE_COMANDO: &str = "AL_SalaDeComando";
pub(super) const ESGOTO_DRENAGEM: &str = "AL_EsgotoDrenagem";

/// `(word, bit, equipment, severity, description)`
pub(super) type AlarmRow = (u16, u8, &'static str, FaultSeverity, &'static str);

pub(super) const BUILTIN_ALARMS: &[AlarmRow] = &[
    // Word 17: filling system, power and protections
    (17, 0, ENCHIMENTO, High, "DISPARO PROTEÇÃO 24VDC ENTRADAS ANALÓGICAS"),
    (17, 1, ENCHIMENTO, High, "DISPARO PROTEÇÃO DESCARREGADOR SOBRETENSÕES"),
    (17, 2, ENCHIMENTO, Medium, "DEFEITO DESCARREGADOR SOBRETENSÕES"),
    (17, 3, ENCHIMENTO, High, "DISPARO PROTEÇÃO ALIM. ANALISADOR ENERGIA"),
    (17, 4, ENCHIMENTO, Critical, "FALTA ALIMENTAÇÃO 220 VDC"),
    (17, 5, ENCHIMENTO, High, "FALHA COMUNICAÇÃO COM SALA DE COMANDO"),
    (17, 6, ENCHIMENTO, Critical, "BY-PASS CONDIÇÕES REMOTAS ABERTURA COMPORTAS ATIVADO!!!!!"),
    (17, 7, ENCHIMENTO, Low, "RESERVA"),
    (17, 8, ENCHIMENTO, Critical, "EMERGÊNCIA ATIVADA"),
    (17, 9, ENCHIMENTO, High, "DEFEITO/ALARME FONTE ALIMENTAÇÃO 400VAC/24VDC"),
    (17, 10, ENCHIMENTO, High, "DEFEITO/ALARME FONTE ALIMENTAÇÃO 220VDC/24VDC"),
    (17, 11, ENCHIMENTO, Critical, "DISPARO INTERRUPTOR GERAL ALIMENTAÇÃO 3X400VAC"),
    (17, 12, ENCHIMENTO, Critical, "FALTA ALIMENTAÇÃO FORÇA MOTRIZ 3X400VAC"),
    (17, 13, ENCHIMENTO, High, "DISPARO PROTEÇÃO 24VDC ENTRADAS DIGITAIS"),
    (17, 14, ENCHIMENTO, High, "DISPARO PROTEÇÃO 24VDC SAIDAS DIGITAIS"),
    (17, 15, ENCHIMENTO, High, "DISPARO PROTEÇÃO 24VDC QUADRO FORÇA MOTRIZ"),
    // Word 18: PLC diagnostics and right gate
    (18, 0, ENCHIMENTO, Low, "RESERVA"),
    (18, 1, ENCHIMENTO, Low, "RESERVA"),
    (18, 2, ENCHIMENTO, Low, "RESERVA"),
    (18, 3, ENCHIMENTO, Low, "RESERVA"),
    (18, 4, ENCHIMENTO, High, "DEFEITO AUTOMATO ERRO DIAGNOSTICO"),
    (18, 5, ENCHIMENTO, High, "DEFEITO AUTOMATO ERRO PROGRAMA"),
    (18, 6, ENCHIMENTO, High, "DEFEITO AUTOMATO ERRO MODULOS"),
    (18, 7, ENCHIMENTO, High, "DEFEITO AUTOMATO ERRO BASTIDOR"),
    (18, 8, ENCHIMENTO, Medium, "DEFEITO RESPOSTA DE MARCHA BOMBA A COMPORTA DIREITA"),
    (18, 9, ENCHIMENTO, Medium, "DEFEITO ARRANCADOR SUAVE BOMBA A COMPORTA DIREITA"),
    (18, 10, ENCHIMENTO, High, "DISPARO PROTEÇÃO BOMBA A COMPORTA DIREITA"),
    (18, 11, ENCHIMENTO, High, "DISPARO PROTEÇÃO VALVULA DISTRIBUIÇÃO COMPORTA DIREITA"),
    (18, 12, ENCHIMENTO, High, "DISPARO PROTEÇÃO VALVULA DESCIDA COMPORTA DIREITA"),
    (18, 13, ENCHIMENTO, Medium, "DEFEITO MEDIDA DE POSIÇÃO COMPORTA DIREITA"),
    (18, 14, ENCHIMENTO, Low, "RESERVA"),
    (18, 15, ENCHIMENTO, Low, "RESERVA"),
    // Emptying system
    (21, 0, ESVAZIAMENTO, High, "DISPARO PROTEÇÃO 24VDC ENTRADAS ANALÓGICAS"),
    (21, 8, ESVAZIAMENTO, Critical, "EMERGÊNCIA ATIVADA"),
    // Downstream gate
    (25, 0, PORTA_JUSANTE, High, "DISPARO PROTEÇÃO 24VDC QUADROS FORÇA MOTRIZ"),
    (25, 8, PORTA_JUSANTE, Critical, "EMERGÊNCIA ATIVADA"),
    // Upstream gate
    (30, 0, PORTA_MONTANTE, High, "DISPARO PROTEÇÃO 24VDC QUADRO FORÇA MOTRIZ-PORTA MONTANTE"),
    (30, 8, PORTA_MONTANTE, Critical, "EMERGÊNCIA ATIVADA-PORTA MONTANTE"),
    // Control room
    (36, 8, SALA_DE_COMANDO, Critical, "EMERGÊNCIA ATIVADA QUADRO SALA DE COMANDO"),
    // Sewage and drainage
    (43, 8, ESGOTO_DRENAGEM, Critical, "EMERGÊNCIA ACTIVADA"),
];

/// `(key, name, equipment, color, icon)`
pub(super) type CategoryRow = (&'static str, &'static str, &'static str, &'static str, &'static str);

pub(super) const BUILTIN_CATEGORIES: &[CategoryRow] = &[
    (ENCHIMENTO, "Enchimento", "Sistema de Enchimento", "#3b82f6", "ArrowUpCircle"),
    (ESVAZIAMENTO, "Esvaziamento", "Sistema de Esvaziamento", "#ef4444", "ArrowDownCircle"),
    (PORTA_JUSANTE, "Porta Jusante", "Porta de Jusante", "#8b5cf6", "Shield"),
    (PORTA_MONTANTE, "Porta Montante", "Porta de Montante", "#06b6d4", "ShieldCheck"),
    (SALA_DE_COMANDO, "Sala de Comando", "Sala de Comando", "#f59e0b", "CommandLine"),
    (ESGOTO_DRENAGEM, "Esgoto e Drenagem", "Sistema de Esgoto e Drenagem", "#10b981", "Droplets"),
];
