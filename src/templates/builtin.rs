//! Built-in templates used when `<root>/templates` does not override them.

use crate::services::templates::{HTTPD_TEMPLATE, MONGOD_TEMPLATE, MY_INI_TEMPLATE};
use crate::vhost::VHOST_TEMPLATE;

const HTTPD_CONF: &str = r#"# Generated by DevNest. Edit the template, not this file.
ServerRoot "{{ server_root }}"
Listen {{ listen_port }}
ServerName localhost:{{ listen_port }}

LoadModule authz_core_module modules/mod_authz_core.so
LoadModule dir_module modules/mod_dir.so
LoadModule mime_module modules/mod_mime.so
LoadModule log_config_module modules/mod_log_config.so
LoadModule rewrite_module modules/mod_rewrite.so
LoadModule proxy_module modules/mod_proxy.so
LoadModule proxy_fcgi_module modules/mod_proxy_fcgi.so

DocumentRoot "{{ document_root }}"
<Directory "{{ document_root }}">
    Options Indexes FollowSymLinks
    AllowOverride All
    Require all granted
</Directory>

DirectoryIndex index.php index.html
ErrorLog "{{ log_path }}/error.log"
LogFormat "%h %l %u %t \"%r\" %>s %b" common
CustomLog "{{ log_path }}/access.log" common
TypesConfig conf/mime.types
{% if php_path %}
PHPIniDir "{{ php_path }}"
<FilesMatch "\.php$">
    SetHandler "proxy:fcgi://127.0.0.1:{{ php_port }}"
</FilesMatch>
{% endif %}
IncludeOptional "{{ etc_path }}/sites-enabled/*.conf"
"#;

const VHOST_CONF: &str = r#"# Generated by DevNest for {{ site_name }}
<VirtualHost *:{{ port }}>
    ServerName {{ hostname }}
    ServerAlias *.{{ hostname }}
    DocumentRoot "{{ project_dir }}"
    <Directory "{{ project_dir }}">
        AllowOverride All
        Require all granted
    </Directory>
</VirtualHost>
"#;

const MONGOD_CFG: &str = r#"# Generated by DevNest
storage:
  dbPath: "{{ data_dir }}"
systemLog:
  destination: file
  path: "{{ log_path }}"
  logAppend: true
net:
  bindIp: 127.0.0.1
  port: {{ port }}
"#;

const MY_INI: &str = r#"# Generated by DevNest
[mysqld]
basedir="{{ base_dir }}"
datadir="{{ data_dir }}"
port={{ port }}
bind-address=127.0.0.1
log-error="{{ log_path }}"

[client]
port={{ port }}
"#;

/// `(name, source)` pairs registered with the engine.
pub const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    (HTTPD_TEMPLATE, HTTPD_CONF),
    (VHOST_TEMPLATE, VHOST_CONF),
    (MONGOD_TEMPLATE, MONGOD_CFG),
    (MY_INI_TEMPLATE, MY_INI),
];
