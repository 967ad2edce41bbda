use crate::bot::messenger::escape_html;

pub struct UserPage<'a> {
    pub user_id: i64,
    pub exists: bool,
    pub active: bool,
    pub expiry_date: Option<&'a str>,
    pub config: Option<&'a str>,
    pub deep_link: Option<&'a str>,
    pub bot_url: Option<&'a str>,
}

const HEAD: &str = r#"<!doctype html>
<html lang="ru">
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width, initial-scale=1"/>
  <title>Shard VPN - Мини-приложение</title>
  <style>
    :root { color-scheme: light dark; }
    body { font-family: system-ui, -apple-system, Segoe UI, Roboto, sans-serif; margin: 0; }
    .wrap { max-width: 720px; margin: 0 auto; padding: 24px; }
    .card { border: 1px solid rgba(0,0,0,.1); border-radius: 12px; padding: 20px; }
    h1 { margin: 0 0 8px; font-size: 22px; }
    .muted { opacity: .8; }
    .status { margin: 16px 0; padding: 12px 14px; border-radius: 10px; font-weight: 600; }
    .ok { background: #e8fff0; color: #0a7a3d; border: 1px solid #b8f0cf; }
    .bad { background: #fff0f0; color: #a30d0d; border: 1px solid #f0c0c0; }
    .row { display: flex; gap: 12px; flex-wrap: wrap; margin-top: 16px; }
    .btn { display: inline-block; text-decoration: none; border: none; cursor: pointer; padding: 14px 16px; border-radius: 10px; font-weight: 600; }
    .btn-primary { background: #2b6fff; color: #fff; }
    .btn-secondary { background: #eef2ff; color: #2b3a55; }
    .code { word-break: break-all; font-family: ui-monospace, Menlo, Consolas, monospace; background: rgba(0,0,0,.06); padding: 12px; border-radius: 8px; }
    footer { margin-top: 20px; font-size: 12px; opacity: .7; }
    @media (prefers-color-scheme: dark) {
      .card { border-color: rgba(255,255,255,.12); }
      .btn-secondary { background: #1f2333; color: #e8eaff; }
      .code { background: rgba(255,255,255,.06); }
      .ok { background: #0f2f20; color: #abf2c1; border-color: #1f5a38; }
      .bad { background: #3a1717; color: #ffc5c5; border-color: #613333; }
    }
  </style>
  <script>
    function copyConfig() {
      const el = document.getElementById('cfg');
      if (!el) return;
      navigator.clipboard.writeText(el.innerText).then(() => {
        const btn = document.getElementById('copyBtn');
        if (btn) { btn.innerText = 'Скопировано ✔'; setTimeout(() => btn.innerText = 'Скопировать конфиг', 1600); }
      });
    }
  </script>
</head>
<body>
  <div class="wrap">
    <div class="card">
      <h1>🌐 Shard VPN</h1>
"#;

const FOOT: &str = r#"    </div>
    <footer>
      Если кнопка не сработала, скопируйте конфиг и вставьте в приложение V2RayTun вручную.
    </footer>
  </div>
</body>
</html>
"#;

impl UserPage<'_> {
    pub fn render(&self) -> String {
        let mut html = String::from(HEAD);
        html.push_str(&format!(
            "      <div class=\"muted\">Профиль пользователя <b>{}</b></div>\n",
            self.user_id
        ));

        if self.exists {
            let (class, label) = if self.active {
                ("ok", "активна ✅")
            } else {
                ("bad", "не активна ⛔")
            };
            html.push_str(&format!(
                "      <div class=\"status {class}\">Статус подписки: {label}</div>\n"
            ));
            if let Some(expiry) = self.expiry_date.filter(|e| !e.is_empty()) {
                html.push_str(&format!(
                    "      <div class=\"muted\">Дата окончания: <b>{}</b></div>\n",
                    escape_html(expiry)
                ));
            }
        } else {
            html.push_str("      <div class=\"status bad\">Пользователь не найден в базе</div>\n");
        }

        if let Some(config) = self.config {
            html.push_str("      <h2 style=\"margin-top:18px; font-size:18px;\">VPN-конфигурация</h2>\n");
            html.push_str(&format!(
                "      <div id=\"cfg\" class=\"code\">{}</div>\n",
                escape_html(config)
            ));
        }

        html.push_str("      <div class=\"row\">\n");
        if let Some(link) = self.deep_link {
            html.push_str(&format!(
                "        <a class=\"btn btn-primary\" href=\"{}\">🔌 Установить VPN</a>\n",
                escape_html(link)
            ));
        }
        if self.config.is_some() {
            html.push_str(
                "        <button id=\"copyBtn\" class=\"btn btn-secondary\" onclick=\"copyConfig()\">Скопировать конфиг</button>\n",
            );
        }
        if let Some(bot) = self.bot_url {
            html.push_str(&format!(
                "        <a class=\"btn btn-secondary\" href=\"{}\">Открыть бота</a>\n",
                escape_html(bot)
            ));
        }
        html.push_str("      </div>\n");

        html.push_str(FOOT);
        html
    }
}
