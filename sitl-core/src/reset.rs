// Протокол управляющего порта RealFlight — SOAP поверх TCP, строго
// fire-and-forget: одно соединение на запрос, одна запись, ответ не
// читается. Единственная наблюдаемая ошибка — отказ установить
// соединение; она и должна отменять визуальный запуск.

use std::{
    io::Write,
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info};
use sitl_types::{LaunchError, LaunchResult, ALL_CHANNELS_MASK, CHANNEL_COUNT, NEUTRAL_CHANNEL_VALUE};

/// Управляющий endpoint RealFlight по умолчанию (loopback).
pub const DEFAULT_CONTROLLER_ADDR: &str = "127.0.0.1:18083";

pub const ACTION_RESTORE_CONTROLLER: &str = "RestoreOriginalControllerDevice";
pub const ACTION_INJECT_CONTROLLER: &str = "InjectUAVControllerInterface";
pub const ACTION_EXCHANGE_DATA: &str = "ExchangeData";
pub const ACTION_RESET_AIRCRAFT: &str = "ResetAircraft";

/// Четыре действия reset-последовательности в фиксированном порядке.
pub const RESET_SEQUENCE: [&str; 4] = [
    ACTION_RESTORE_CONTROLLER,
    ACTION_INJECT_CONTROLLER,
    ACTION_EXCHANGE_DATA,
    ACTION_RESET_AIRCRAFT,
];

/// Параметры reset-клиента.
#[derive(Debug, Clone)]
pub struct ResetConfig {
    /// Адрес управляющего порта симулятора
    pub addr: String,
    /// Пауза между шагами. Протокол её явно не требует, поэтому она
    /// настраиваемая, а не зашитая.
    pub settle_delay: Duration,
    /// Таймаут установления TCP соединения
    pub connect_timeout: Duration,
    /// Нейтральное значение, выставляемое во все каналы
    pub neutral: f32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_CONTROLLER_ADDR.to_string(),
            settle_delay: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(2),
            neutral: NEUTRAL_CHANNEL_VALUE,
        }
    }
}

/// Клиент сброса внешнего визуального симулятора.
pub struct ResetClient {
    config: ResetConfig,
}

impl ResetClient {
    pub fn new() -> Self {
        Self::with_config(ResetConfig::default())
    }

    pub fn with_config(config: ResetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResetConfig {
        &self.config
    }

    /// Прогоняет фиксированную последовательность из четырёх запросов:
    /// restore → inject → нейтраль во все каналы → сброс позиции.
    ///
    /// Последовательность синхронная и обязана завершиться до spawn
    /// прошивки; ошибка соединения на любом шаге прерывает её.
    pub fn reset_aircraft(&self) -> LaunchResult<()> {
        info!("Resetting visual simulator aircraft ({})", self.config.addr);

        // Сначала restore: позволяет переподключиться после смены
        // модели в симуляторе или упавшей прошлой сессии
        self.send_action(ACTION_RESTORE_CONTROLLER, &simple_body(ACTION_RESTORE_CONTROLLER))?;
        self.settle();

        self.send_action(ACTION_INJECT_CONTROLLER, &simple_body(ACTION_INJECT_CONTROLLER))?;
        self.settle();

        // Все 12 каналов в нейтраль до передачи управления прошивке
        self.send_action(ACTION_EXCHANGE_DATA, &exchange_data_body(self.config.neutral))?;
        self.settle();

        self.send_action(ACTION_RESET_AIRCRAFT, &simple_body(ACTION_RESET_AIRCRAFT))?;

        Ok(())
    }

    fn settle(&self) {
        if !self.config.settle_delay.is_zero() {
            std::thread::sleep(self.config.settle_delay);
        }
    }

    /// Отправляет один запрос на свежем соединении, ничего не читая.
    fn send_action(
        &self,
        action: &str,
        body: &str,
    ) -> LaunchResult<()> {
        let addr = self
            .config
            .addr
            .to_socket_addrs()
            .map_err(|e| LaunchError::reset(&self.config.addr, e))?
            .next()
            .ok_or_else(|| {
                LaunchError::reset(
                    &self.config.addr,
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "address resolved to nothing",
                    ),
                )
            })?;

        let mut stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|e| LaunchError::reset(&self.config.addr, e))?;

        let request = encode_request(action, body);
        stream
            .write_all(request.as_bytes())
            .map_err(|e| LaunchError::reset(&self.config.addr, e))?;

        debug!("Reset action sent: {action}");

        // Соединение закрывается здесь; ответ не читается
        Ok(())
    }
}

impl Default for ResetClient {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Кодирование запросов
////////////////////////////////////////////////////////////////////////////////

/// Оборачивает SOAP-тело в минимальный HTTP POST. Управляющий порт
/// принимает именно такой кадр, включая `\n` вместо `\r\n`.
pub fn encode_request(
    action: &str,
    body: &str,
) -> String {
    format!(
        "POST / HTTP/1.1\n\
         soapaction: '{action}'\n\
         content-length: {}\n\
         content-type: text/xml;charset='UTF-8'\n\
         Connection: Keep-Alive\n\
         \n\
         {body}",
        body.len()
    )
}

/// SOAP-тело для действий без параметров.
pub fn simple_body(action: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='UTF-8'?>\n\
         <soap:Envelope xmlns:soap='http://schemas.xmlsoap.org/soap/envelope/' xmlns:xsd='http://www.w3.org/2001/XMLSchema' xmlns:xsi='http://www.w3.org/2001/XMLSchema-instance'>\n\
         <soap:Body>\n\
         <{action}><a>1</a><b>2</b></{action}>\n\
         </soap:Body>\n\
         </soap:Envelope>"
    )
}

/// SOAP-тело `ExchangeData`: все 12 каналов активны, все — в нейтрали.
///
/// Тело не зависит от выбранного самолёта.
pub fn exchange_data_body(neutral: f32) -> String {
    let items: String = (0..CHANNEL_COUNT)
        .map(|_| format!("<item>{neutral}</item>\n"))
        .collect();

    format!(
        "<?xml version='1.0' encoding='UTF-8'?><soap:Envelope xmlns:soap='http://schemas.xmlsoap.org/soap/envelope/' xmlns:xsd='http://www.w3.org/2001/XMLSchema' xmlns:xsi='http://www.w3.org/2001/XMLSchema-instance'>\n\
         <soap:Body>\n\
         <ExchangeData>\n\
         <pControlInputs>\n\
         <m-selectedChannels>{ALL_CHANNELS_MASK}</m-selectedChannels>\n\
         <m-channelValues-0to1>\n\
         {items}\
         </m-channelValues-0to1>\n\
         </pControlInputs>\n\
         </ExchangeData>\n\
         </soap:Body>\n\
         </soap:Envelope>"
    )
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{io::Read, net::TcpListener, thread::JoinHandle};

    use super::*;

    /// Слушатель, захватывающий `expected` запросов целиком
    /// (по одному соединению на запрос).
    fn spawn_capture_server(expected: usize) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = std::thread::spawn(move || {
            let mut requests = Vec::new();

            for _ in 0..expected {
                let (mut stream, _) = listener.accept().unwrap();
                let mut raw = String::new();
                // Клиент закрывает соединение после записи — читаем до EOF
                stream.read_to_string(&mut raw).unwrap();
                requests.push(raw);
            }

            requests
        });

        (addr, handle)
    }

    fn instant_client(addr: String) -> ResetClient {
        ResetClient::with_config(ResetConfig {
            addr,
            settle_delay: Duration::ZERO,
            ..ResetConfig::default()
        })
    }

    fn action_of(request: &str) -> &str {
        request
            .lines()
            .find_map(|l| l.strip_prefix("soapaction: '"))
            .and_then(|l| l.strip_suffix('\''))
            .expect("request must carry a soapaction header")
    }

    fn body_of(request: &str) -> &str {
        request
            .split_once("\n\n")
            .expect("request must have a header/body separator")
            .1
    }

    #[test]
    fn test_sequence_order_and_distinct_connections() {
        let (addr, server) = spawn_capture_server(4);

        instant_client(addr).reset_aircraft().unwrap();

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 4, "ровно 4 запроса, по одному соединению");

        let actions: Vec<&str> = requests.iter().map(|r| action_of(r)).collect();
        assert_eq!(actions, RESET_SEQUENCE);
    }

    #[test]
    fn test_content_length_matches_body() {
        let (addr, server) = spawn_capture_server(4);

        instant_client(addr).reset_aircraft().unwrap();

        for request in server.join().unwrap() {
            let declared: usize = request
                .lines()
                .find_map(|l| l.strip_prefix("content-length: "))
                .unwrap()
                .parse()
                .unwrap();

            assert_eq!(declared, body_of(&request).len());
        }
    }

    #[test]
    fn test_exchange_data_all_channels_neutral() {
        let body = exchange_data_body(0.0);

        assert!(body.contains("<m-selectedChannels>4095</m-selectedChannels>"));
        assert_eq!(
            body.matches("<item>0</item>").count(),
            CHANNEL_COUNT,
            "все 12 каналов в нейтрали"
        );
    }

    #[test]
    fn test_exchange_data_neutral_formatting() {
        assert!(exchange_data_body(0.5).contains("<item>0.5</item>"));
        assert_eq!(exchange_data_body(0.0), exchange_data_body(0.0));
    }

    #[test]
    fn test_request_framing() {
        let request = encode_request("ResetAircraft", "abc");

        assert!(request.starts_with("POST / HTTP/1.1\n"));
        assert!(request.contains("soapaction: 'ResetAircraft'\n"));
        assert!(request.contains("content-length: 3\n"));
        assert!(request.contains("content-type: text/xml;charset='UTF-8'\n"));
        assert!(request.ends_with("\n\nabc"));
    }

    #[test]
    fn test_simple_body_shape() {
        let body = simple_body("ResetAircraft");

        assert!(body.starts_with("<?xml version='1.0'"));
        assert!(body.contains("<ResetAircraft><a>1</a><b>2</b></ResetAircraft>"));
        assert!(body.ends_with("</soap:Envelope>"));
    }

    #[test]
    fn test_connection_refused_is_reset_failure() {
        // Занимаем порт и сразу освобождаем — соединение откажут
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let err = instant_client(addr).reset_aircraft().unwrap_err();
        assert!(matches!(err, sitl_types::LaunchError::Reset { .. }));
    }
}
